//! Outbound notifications for a presentation layer.
//!
//! The engine never calls into rendering code. It reports what happened
//! through an [`EventSink`] and leaves drawing to whoever listens.

use std::sync::mpsc::Sender;

use serde::Serialize;

use crate::{Hole, Jump, Vector};

/// Something that changed in a game session.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    /// A jump was applied to the canonical board.
    MoveApplied { origin: Hole, vector: Vector },
    /// The last jump was taken back.
    MoveUndone { origin: Hole, vector: Vector },
    /// The board went back to its starting configuration.
    Restarted,
    /// A fresh suggestion is available (`None` on a terminal board).
    BestMoveUpdated { best: Option<Jump> },
}

impl GameEvent {
    pub fn applied(jump: Jump) -> GameEvent {
        GameEvent::MoveApplied {
            origin: jump.origin,
            vector: jump.vector,
        }
    }

    pub fn undone(jump: Jump) -> GameEvent {
        GameEvent::MoveUndone {
            origin: jump.origin,
            vector: jump.vector,
        }
    }
}

/// Receiver of [`GameEvent`]s.
///
/// Sinks may be called from a background search thread.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: GameEvent);
}

impl EventSink for Sender<GameEvent> {
    fn emit(&self, event: GameEvent) {
        if self.send(event).is_err() {
            tracing::debug!(?event, "event receiver dropped");
        }
    }
}
