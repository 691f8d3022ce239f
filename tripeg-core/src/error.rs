//! Error types for board operations.

use derive_more::{Display, Error};

use crate::{Hole, Vector};

/// Errors reported by the board model and best-move lookup.
///
/// Every failing operation validates before touching state, so a board that
/// returned one of these is unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Display, Error)]
pub enum PegError {
    /// The starting occupancy does not cover exactly the 15 fixed holes.
    #[display("invalid topology: {reason}")]
    InvalidTopology { reason: String },

    /// The origin/vector pair is not a legal jump on the current board.
    #[display("illegal move {vector} from {origin}")]
    IllegalMove { origin: Hole, vector: Vector },

    /// Undo was requested with an empty move history.
    #[display("no move to undo")]
    EmptyHistory,

    /// Best-move lookup past the end of the known path.
    #[display("no move available: history has {history_len} jumps, path has {path_len}")]
    NoMoveAvailable { history_len: usize, path_len: usize },
}

/// Jump notation that could not be parsed.
#[derive(Clone, Debug, PartialEq, Eq, Display, Error)]
#[display("invalid jump notation: {notation:?}")]
pub struct ParseJumpError {
    pub notation: String,
}

impl ParseJumpError {
    pub(crate) fn new(notation: &str) -> Self {
        Self {
            notation: notation.to_string(),
        }
    }
}
