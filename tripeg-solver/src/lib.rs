//! Triangular peg solitaire solver.
//!
//! Exhaustive search for the fewest-pegs-left line, an opening book for the
//! first few jumps, and a game session that keeps a best-move suggestion
//! current in the background.

pub mod advisor;
pub mod book;
pub mod error;
pub mod session;
pub mod solver;
pub mod sqlite;
pub mod stats;

pub use advisor::{advise, Advice, AdviceSource};
pub use book::{build_book, MemoryBook, OpeningBook, BOOK_DEPTH};
pub use error::BookError;
pub use session::GameSession;
pub use solver::{solve, SearchOutcome, Solver};
pub use sqlite::SqliteBook;
pub use stats::SearchStats;
