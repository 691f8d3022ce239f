//! A game in progress with background best-move advice.
//!
//! Every board change supersedes the running advisor: its generation is
//! bumped, its running flag cleared, and a fresh run starts on a clone of
//! the new board. A run publishes only if its generation is still current
//! when it finishes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use tripeg_core::{Board, EventSink, GameEvent, Hole, Jump, LegalMoves, PegError, Vector};

use crate::advisor::{advise, Advice};
use crate::book::OpeningBook;

/// Latest published advice, tagged with the generation it belongs to.
#[derive(Default)]
struct Published {
    generation: u64,
    advice: Option<Advice>,
}

struct Run {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

pub struct GameSession {
    board: Board,
    sink: Arc<dyn EventSink>,
    book: Option<Arc<dyn OpeningBook>>,
    published: Arc<Mutex<Published>>,
    run: Option<Run>,
}

fn lock(published: &Mutex<Published>) -> MutexGuard<'_, Published> {
    // A panicked run leaves nothing half-written worth refusing.
    published.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Store `advice` and report it, unless a newer run has started since
/// `generation` was issued. Returns whether the advice was published.
fn publish(
    published: &Mutex<Published>,
    generation: u64,
    advice: Advice,
    sink: &dyn EventSink,
) -> bool {
    let mut published = lock(published);
    if published.generation != generation {
        tracing::debug!(generation, current = published.generation, "discarding stale advice");
        return false;
    }
    let best = advice.best_move().ok();
    tracing::info!(
        generation,
        best_score = advice.best_score,
        source = ?advice.source,
        "best move updated"
    );
    published.advice = Some(advice);
    sink.emit(GameEvent::BestMoveUpdated { best });
    true
}

impl GameSession {
    /// Start a session on the standard board.
    pub fn new(sink: Arc<dyn EventSink>, book: Option<Arc<dyn OpeningBook>>) -> Self {
        Self::with_board(Board::standard(), sink, book)
    }

    /// Start a session on `board` and begin advising on it.
    pub fn with_board(
        board: Board,
        sink: Arc<dyn EventSink>,
        book: Option<Arc<dyn OpeningBook>>,
    ) -> Self {
        let mut session = Self {
            board,
            sink,
            book,
            published: Arc::new(Mutex::new(Published::default())),
            run: None,
        };
        session.refresh(None);
        session
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn legal_moves(&self) -> LegalMoves {
        self.board.legal_moves()
    }

    /// Apply a jump to the canonical board.
    pub fn apply(&mut self, origin: Hole, vector: Vector) -> Result<(), PegError> {
        self.board.apply(origin, vector)?;
        self.refresh(Some(GameEvent::MoveApplied { origin, vector }));
        Ok(())
    }

    /// Take back the last jump.
    pub fn undo(&mut self) -> Result<Jump, PegError> {
        let jump = self.board.undo()?;
        self.refresh(Some(GameEvent::undone(jump)));
        Ok(jump)
    }

    /// Reset to the starting configuration.
    pub fn restart(&mut self) {
        self.board.restart();
        self.refresh(Some(GameEvent::Restarted));
    }

    /// Latest suggestion for the current board.
    ///
    /// None while the advisor is still running or on a terminal board.
    pub fn best_move(&self) -> Option<Jump> {
        lock(&self.published)
            .advice
            .as_ref()
            .and_then(|advice| advice.best_move().ok())
    }

    /// Latest published advice for the current board.
    pub fn advice(&self) -> Option<Advice> {
        lock(&self.published).advice.clone()
    }

    /// Whether the advisor for the current board is still running.
    pub fn is_pending(&self) -> bool {
        self.run
            .as_ref()
            .is_some_and(|run| !run.handle.is_finished())
    }

    /// Block until the current advisor run has finished.
    pub fn wait(&mut self) {
        if let Some(run) = self.run.take() {
            if run.handle.join().is_err() {
                tracing::warn!("advisor thread panicked");
            }
        }
    }

    /// Supersede the previous run, report `event`, then advise on the board.
    fn refresh(&mut self, event: Option<GameEvent>) {
        let generation = {
            let mut published = lock(&self.published);
            published.generation += 1;
            published.advice = None;
            published.generation
        };

        if let Some(previous) = self.run.take() {
            previous.running.store(false, Ordering::SeqCst);
        }

        if let Some(event) = event {
            self.sink.emit(event);
        }

        let running = Arc::new(AtomicBool::new(true));
        let board = self.board.clone();
        let sink = Arc::clone(&self.sink);
        let book = self.book.clone();
        let published = Arc::clone(&self.published);
        let flag = Arc::clone(&running);

        let handle = thread::spawn(move || {
            let mut rng = rand::rng();
            let Some(advice) = advise(&board, book.as_deref(), &mut rng, &flag) else {
                tracing::debug!(generation, "advisor cancelled");
                return;
            };

            publish(&published, generation, advice, sink.as_ref());
        });

        self.run = Some(Run { running, handle });
    }
}

impl Drop for GameSession {
    fn drop(&mut self) {
        if let Some(run) = &self.run {
            run.running.store(false, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::{self, Receiver};

    fn session() -> (GameSession, Receiver<GameEvent>) {
        let (tx, rx) = mpsc::channel();
        (GameSession::new(Arc::new(tx), None), rx)
    }

    #[test]
    fn test_initial_advice() {
        let (mut session, rx) = session();
        session.wait();
        let best = session.best_move().unwrap();
        assert!(session.board().is_legal(best.origin, best.vector));
        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![GameEvent::BestMoveUpdated { best: Some(best) }]
        );
    }

    #[test]
    fn test_apply_emits_then_updates() {
        let (mut session, rx) = session();
        session.wait();
        let _ = rx.try_iter().count();

        session.apply(Hole(2, 4), Vector(2, 4)).unwrap();
        session.wait();

        let events: Vec<GameEvent> = rx.try_iter().collect();
        assert_eq!(
            events[0],
            GameEvent::MoveApplied { origin: Hole(2, 4), vector: Vector(2, 4) }
        );
        let best = session.best_move().unwrap();
        assert_eq!(events[1], GameEvent::BestMoveUpdated { best: Some(best) });
        assert_eq!(events.len(), 2);
        assert_eq!(session.advice().unwrap().best_score, 1);
    }

    #[test]
    fn test_illegal_apply_changes_nothing() {
        let (mut session, rx) = session();
        session.wait();
        let _ = rx.try_iter().count();

        let err = session.apply(Hole(0, 0), Vector(4, 0)).unwrap_err();
        assert!(matches!(err, PegError::IllegalMove { .. }));
        assert_eq!(session.board(), &Board::standard());
        assert!(session.best_move().is_some());
        assert_eq!(rx.try_iter().count(), 0);
    }

    #[test]
    fn test_undo_and_restart_events() {
        let (mut session, rx) = session();
        session.apply(Hole(2, 4), Vector(2, 4)).unwrap();
        session.apply(Hole(0, 0), Vector(2, 4)).unwrap();
        assert_eq!(session.undo().unwrap(), Jump::new(Hole(0, 0), Vector(2, 4)));
        session.restart();
        session.wait();

        let events: Vec<GameEvent> = rx
            .try_iter()
            .filter(|e| !matches!(e, GameEvent::BestMoveUpdated { .. }))
            .collect();
        assert_eq!(
            events,
            vec![
                GameEvent::MoveApplied { origin: Hole(2, 4), vector: Vector(2, 4) },
                GameEvent::MoveApplied { origin: Hole(0, 0), vector: Vector(2, 4) },
                GameEvent::MoveUndone { origin: Hole(0, 0), vector: Vector(2, 4) },
                GameEvent::Restarted,
            ]
        );
        assert_eq!(session.board(), &Board::standard());
    }

    #[test]
    fn test_undo_empty_history() {
        let (mut session, _rx) = session();
        assert_eq!(session.undo(), Err(PegError::EmptyHistory));
    }

    #[test]
    fn test_stale_runs_never_publish_after_newer_events() {
        let (mut session, rx) = session();
        session.apply(Hole(2, 4), Vector(2, 4)).unwrap();
        session.apply(Hole(0, 0), Vector(2, 4)).unwrap();
        session.wait();

        // After the last move event, only advice for the final board may follow.
        let events: Vec<GameEvent> = rx.try_iter().collect();
        let last_move = events
            .iter()
            .rposition(|e| matches!(e, GameEvent::MoveApplied { .. }))
            .unwrap();
        let after: Vec<&GameEvent> = events[last_move + 1..].iter().collect();
        let best = session.best_move().unwrap();
        assert_eq!(after, vec![&GameEvent::BestMoveUpdated { best: Some(best) }]);
    }

    #[test]
    fn test_stale_generation_is_discarded() {
        let (tx, rx) = mpsc::channel();
        let published = Mutex::new(Published {
            generation: 2,
            advice: None,
        });
        let advice = advise(&Board::standard(), None, &mut rand::rng(), &AtomicBool::new(true))
            .unwrap();

        assert!(!publish(&published, 1, advice.clone(), &tx));
        assert_eq!(lock(&published).advice, None);
        assert_eq!(rx.try_iter().count(), 0);

        assert!(publish(&published, 2, advice.clone(), &tx));
        assert_eq!(lock(&published).advice, Some(advice.clone()));
        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![GameEvent::BestMoveUpdated {
                best: Some(advice.path[0])
            }]
        );
    }

    #[test]
    fn test_superseded_session_run_is_discarded() {
        let (mut session, rx) = session();
        session.wait();
        let _ = rx.try_iter().count();
        let advice = session.advice().unwrap();

        // A result for the generation before this move arrives late
        session.apply(Hole(2, 4), Vector(2, 4)).unwrap();
        let stale = lock(&session.published).generation - 1;
        assert!(!publish(&session.published, stale, advice, &NullSink));
        session.wait();

        let best = session.best_move().unwrap();
        assert!(session.board().is_legal(best.origin, best.vector));
        assert_eq!(session.advice().unwrap().history_len, 1);
    }

    struct NullSink;

    impl EventSink for NullSink {
        fn emit(&self, _: GameEvent) {}
    }

    #[test]
    fn test_terminal_board_publishes_none() {
        let (tx, rx) = mpsc::channel();
        let board = Board::new(Hole::all().map(|h| (h, h == Hole(0, 0) || h == Hole(2, 0)))).unwrap();
        let mut session = GameSession::with_board(board, Arc::new(tx), None);
        session.wait();
        let _ = rx.try_iter().count();

        session.apply(Hole(0, 0), Vector(4, 0)).unwrap();
        session.wait();
        let events: Vec<GameEvent> = rx.try_iter().collect();
        assert_eq!(events.last(), Some(&GameEvent::BestMoveUpdated { best: None }));
        assert_eq!(session.best_move(), None);
        assert_eq!(session.advice().unwrap().best_score, 1);
    }
}
