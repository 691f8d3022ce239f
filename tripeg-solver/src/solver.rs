//! Iterative backtracking solver with an occupancy-keyed cache.
//!
//! The search walks every sequence of legal jumps from a board until no jump
//! remains. For each terminal peg count it keeps the first full path found,
//! exploring origins in hole order and vectors in topology order.
//!
//! With the cache enabled, each explored occupancy stores, per reachable
//! terminal peg count, the first jump leading toward it. A repeated
//! occupancy merges those scores instead of being searched again, and paths
//! are replayed from the root afterwards. Since the order of a subtree's
//! terminals depends only on occupancy, both modes report the same paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tripeg_core::{Board, Jump, JumpList, PackedJump, PegError, HOLE_COUNT};

use crate::stats::SearchStats;

/// Per-occupancy record: for each terminal peg count, the packed index of
/// the first jump toward it, [`TERMINAL`] or [`UNREACHED`].
type Firsts = [u8; HOLE_COUNT + 1];

/// The position itself is terminal with this peg count.
const TERMINAL: u8 = u8::MAX - 1;
/// No terminal with this peg count is reachable.
const UNREACHED: u8 = u8::MAX;

const NO_FIRSTS: Firsts = [UNREACHED; HOLE_COUNT + 1];

/// Iterations between checks of the progress log timer.
const LOG_CHECK_MASK: u64 = 0xFFFF;

/// Result of one search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchOutcome {
    /// Terminal peg count -> first full path (history included) reaching it.
    pub paths: BTreeMap<u8, Vec<Jump>>,
    /// Minimal terminal peg count.
    pub best_score: u8,
    /// Full path reaching `best_score`.
    pub best_path: Vec<Jump>,
    /// History length of the searched board.
    pub history_len: usize,
}

impl SearchOutcome {
    fn from_paths(paths: BTreeMap<u8, Vec<Jump>>, history_len: usize) -> Option<Self> {
        let (&best_score, best_path) = paths.iter().next()?;
        let best_path = best_path.clone();
        Some(Self {
            paths,
            best_score,
            best_path,
            history_len,
        })
    }

    /// The jumps after the searched board's history.
    pub fn continuation(&self) -> &[Jump] {
        self.best_path.get(self.history_len..).unwrap_or_default()
    }

    /// The next jump to play, `best_path[history_len]`.
    pub fn best_move(&self) -> Result<Jump, PegError> {
        tripeg_core::best_move(&self.best_path, self.history_len)
    }

    /// Every reachable terminal peg count, smallest first.
    pub fn scores(&self) -> impl Iterator<Item = u8> + '_ {
        self.paths.keys().copied()
    }
}

/// Stack frame for iterative search.
struct Frame {
    /// Occupancy of this position
    key: u16,
    /// Jump that led here from the parent (None for root)
    via: Option<PackedJump>,
    /// Legal jumps to explore
    jumps: JumpList,
    /// Index into jumps
    jump_idx: usize,
    /// Scores collected from children explored so far
    firsts: Firsts,
}

/// Fold a child's reachable scores into its parent, first child winning.
#[inline]
fn absorb(parent: &mut Firsts, child: &Firsts, via: PackedJump) {
    for (slot, &score) in parent.iter_mut().zip(child.iter()) {
        if score != UNREACHED && *slot == UNREACHED {
            *slot = via.0;
        }
    }
}

#[inline]
fn terminal_firsts(pegs: u8) -> Firsts {
    let mut firsts = NO_FIRSTS;
    firsts[pegs as usize] = TERMINAL;
    firsts
}

/// Exhaustive backtracking solver.
pub struct Solver {
    memoize: bool,
    /// Cache: occupancy -> first jump per reachable terminal peg count
    cache: HashMap<u16, Firsts>,
    /// Statistics for the most recent search
    pub stats: SearchStats,
    /// Interval between progress log lines
    pub log_interval: Duration,
}

impl Solver {
    /// Solver that caches results by board occupancy.
    pub fn new() -> Self {
        Self {
            memoize: true,
            cache: HashMap::new(),
            stats: SearchStats::new(),
            log_interval: Duration::from_secs(5),
        }
    }

    /// Solver that re-explores every path without a cache.
    pub fn exhaustive() -> Self {
        Self {
            memoize: false,
            ..Self::new()
        }
    }

    pub fn is_memoized(&self) -> bool {
        self.memoize
    }

    /// Number of occupancies cached by the last search.
    pub fn cached_positions(&self) -> usize {
        self.cache.len()
    }

    /// Search every continuation of `board`.
    ///
    /// The board is cloned; the caller's copy is never touched. Returns None
    /// if `running` was cleared before the search finished.
    pub fn solve(&mut self, board: &Board, running: &AtomicBool) -> Option<SearchOutcome> {
        self.cache.clear();
        self.stats = SearchStats::new();

        let mut board = board.clone();
        let history_len = board.history_len();

        let mut paths: BTreeMap<u8, Vec<Jump>> = BTreeMap::new();
        let root_firsts = self.search(&mut board, running, &mut paths)?;

        if self.memoize {
            for (pegs, &first) in root_firsts.iter().enumerate() {
                if first != UNREACHED {
                    paths.insert(pegs as u8, self.replay(&board, pegs));
                }
            }
        }

        self.stats.log_summary();
        SearchOutcome::from_paths(paths, history_len)
    }

    /// Depth-first walk from `board`. Returns the root's reachable scores.
    ///
    /// In exhaustive mode, terminal paths are recorded into `paths` as they
    /// are found.
    fn search(
        &mut self,
        board: &mut Board,
        running: &AtomicBool,
        paths: &mut BTreeMap<u8, Vec<Jump>>,
    ) -> Option<Firsts> {
        let root_jumps = board.legal_jumps_packed();
        if root_jumps.is_empty() {
            let pegs = board.peg_count();
            self.stats.record_terminal(pegs);
            paths.insert(pegs, board.history());
            let firsts = terminal_firsts(pegs);
            if self.memoize {
                self.cache.insert(board.occupancy(), firsts);
            }
            return Some(firsts);
        }

        let mut stack: Vec<Frame> = Vec::with_capacity(HOLE_COUNT);
        stack.push(Frame {
            key: board.occupancy(),
            via: None,
            jumps: root_jumps,
            jump_idx: 0,
            firsts: NO_FIRSTS,
        });

        let mut iterations: u64 = 0;

        while let Some(frame) = stack.last_mut() {
            // Check for interrupt
            if !running.load(Ordering::Relaxed) {
                return None;
            }

            iterations += 1;
            if iterations & LOG_CHECK_MASK == 0 && self.stats.should_log(self.log_interval) {
                self.stats.log_progress(self.cache.len());
            }

            if frame.jump_idx < frame.jumps.len() {
                let jump = frame.jumps.get(frame.jump_idx);
                frame.jump_idx += 1;

                if !board.apply_packed(jump) {
                    continue;
                }
                let child_key = board.occupancy();

                // Cache hit
                if self.memoize {
                    if let Some(child) = self.cache.get(&child_key) {
                        self.stats.cache_hits += 1;
                        absorb(&mut frame.firsts, child, jump);
                        board.undo_packed();
                        continue;
                    }
                }

                let child_jumps = board.legal_jumps_packed();

                // Terminal - no jump left
                if child_jumps.is_empty() {
                    let pegs = board.peg_count();
                    self.stats.record_terminal(pegs);
                    let child = terminal_firsts(pegs);
                    absorb(&mut frame.firsts, &child, jump);
                    if self.memoize {
                        self.cache.insert(child_key, child);
                    } else {
                        paths.entry(pegs).or_insert_with(|| board.history());
                    }
                    board.undo_packed();
                    continue;
                }

                stack.push(Frame {
                    key: child_key,
                    via: Some(jump),
                    jumps: child_jumps,
                    jump_idx: 0,
                    firsts: NO_FIRSTS,
                });
                self.stats.max_depth = self.stats.max_depth.max(stack.len() as u64);
            } else {
                // All children explored - pop frame and propagate
                let Some(done) = stack.pop() else { break };
                self.stats.positions_evaluated += 1;

                if self.memoize {
                    self.cache.insert(done.key, done.firsts);
                }

                match (done.via, stack.last_mut()) {
                    (Some(via), Some(parent)) => {
                        board.undo_packed();
                        absorb(&mut parent.firsts, &done.firsts, via);
                    }
                    _ => return Some(done.firsts),
                }
            }
        }

        None
    }

    /// Rebuild the first path to `pegs` by following cached first jumps.
    fn replay(&self, root: &Board, pegs: usize) -> Vec<Jump> {
        let mut board = root.clone();
        while let Some(firsts) = self.cache.get(&board.occupancy()) {
            match firsts[pegs] {
                TERMINAL | UNREACHED => break,
                idx => {
                    if !board.apply_packed(PackedJump(idx)) {
                        break;
                    }
                }
            }
        }
        board.history()
    }
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a memoized search to completion.
pub fn solve(board: &Board) -> Option<SearchOutcome> {
    Solver::new().solve(board, &AtomicBool::new(true))
}
