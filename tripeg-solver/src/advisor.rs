//! Best-line advice: opening book first, live search otherwise.

use std::sync::atomic::AtomicBool;

use rand::seq::IndexedRandom;
use rand::Rng;
use tripeg_core::{Board, Jump, PegError};

use crate::book::{OpeningBook, BOOK_DEPTH};
use crate::solver::Solver;

/// Where a suggestion came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdviceSource {
    Book,
    Search,
}

/// A best line for the current board.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Advice {
    /// Fewest pegs reachable from the board.
    pub best_score: u8,
    /// Full path: the board's history followed by a best continuation.
    pub path: Vec<Jump>,
    /// Board history length when advice was computed.
    pub history_len: usize,
    pub source: AdviceSource,
}

impl Advice {
    /// Next jump along the path.
    pub fn best_move(&self) -> Result<Jump, PegError> {
        tripeg_core::best_move(&self.path, self.history_len)
    }

    pub fn continuation(&self) -> &[Jump] {
        self.path.get(self.history_len..).unwrap_or_default()
    }
}

/// Replay a recorded line on a clone of `board`.
///
/// The line must extend the history by at least one jump and be legal
/// throughout. Returns the board at the end of the line.
fn check_line(board: &Board, line: &[Jump]) -> Option<Board> {
    let history = board.history();
    if line.len() <= history.len() || !line.starts_with(&history) {
        return None;
    }
    let mut replay = board.clone();
    for &jump in &line[history.len()..] {
        replay.apply_jump(jump).ok()?;
    }
    Some(replay)
}

/// Run a checked line out to a terminal board, returning the full path and
/// its peg count. A line that stops early is finished by live search.
fn complete_line(
    end: &Board,
    line: Vec<Jump>,
    solver: &mut Solver,
    running: &AtomicBool,
) -> Option<(Vec<Jump>, u8)> {
    if end.is_terminal() {
        return Some((line, end.peg_count()));
    }
    let outcome = solver.solve(end, running)?;
    tracing::debug!(
        recorded = line.len(),
        completed = outcome.best_path.len(),
        "finished partial book line"
    );
    Some((outcome.best_path, outcome.best_score))
}

/// Pick a recorded line for `board`, if the book has a usable one.
///
/// None on a miss, on a book with no usable line, or if `running` is cleared
/// while finishing a partial line.
fn from_book<R: Rng + ?Sized>(
    board: &Board,
    book: &dyn OpeningBook,
    rng: &mut R,
    running: &AtomicBool,
) -> Option<Advice> {
    let history = board.history();
    let lines = match book.lookup(&history) {
        Ok(Some(lines)) => lines,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(error = %e, "opening book unreadable, searching instead");
            return None;
        }
    };

    let mut solver = Solver::new();
    let mut valid: Vec<(Vec<Jump>, u8)> = Vec::with_capacity(lines.len());
    for line in lines {
        let Some(end) = check_line(board, &line) else {
            tracing::warn!(line = %tripeg_core::history_key(&line), "dropping invalid book line");
            continue;
        };
        valid.push(complete_line(&end, line, &mut solver, running)?);
    }

    // Only lines with the best recorded score are candidates
    let best_score = valid.iter().map(|(_, score)| *score).min()?;
    let candidates: Vec<&Vec<Jump>> = valid
        .iter()
        .filter(|(_, score)| *score == best_score)
        .map(|(line, _)| line)
        .collect();
    let path = (*candidates.choose(rng)?).clone();

    Some(Advice {
        best_score,
        path,
        history_len: history.len(),
        source: AdviceSource::Book,
    })
}

/// Advise on `board`, consulting `book` for short histories.
///
/// Returns None only if `running` is cleared during a live search.
pub fn advise<R: Rng + ?Sized>(
    board: &Board,
    book: Option<&dyn OpeningBook>,
    rng: &mut R,
    running: &AtomicBool,
) -> Option<Advice> {
    if board.history_len() <= BOOK_DEPTH {
        if let Some(advice) = book.and_then(|book| from_book(board, book, rng, running)) {
            tracing::debug!(history = board.history_len(), "advice from opening book");
            return Some(advice);
        }
    }

    let outcome = Solver::new().solve(board, running)?;
    Some(Advice {
        best_score: outcome.best_score,
        path: outcome.best_path,
        history_len: outcome.history_len,
        source: AdviceSource::Search,
    })
}
