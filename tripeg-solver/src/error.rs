//! Opening book error types.

use std::io;

use derive_more::{Display, Error};

/// Failure to read or write an opening book.
///
/// A book that fails is never fatal to play: callers fall back to live search.
#[derive(Debug, Display, Error)]
pub enum BookError {
    #[display("book I/O error: {source}")]
    Io { source: io::Error },

    #[display("book database error: {source}")]
    Sqlite { source: rusqlite::Error },

    #[display("corrupt book: {reason}")]
    Corrupt { reason: String },
}

impl BookError {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Self::Corrupt {
            reason: reason.into(),
        }
    }
}

impl From<io::Error> for BookError {
    fn from(source: io::Error) -> Self {
        Self::Io { source }
    }
}

impl From<rusqlite::Error> for BookError {
    fn from(source: rusqlite::Error) -> Self {
        Self::Sqlite { source }
    }
}
