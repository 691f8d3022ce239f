//! Search statistics tracking.

use std::time::{Duration, Instant};

use tripeg_core::HOLE_COUNT;

/// Statistics collected during one search.
#[derive(Debug, Clone)]
pub struct SearchStats {
    /// Positions whose continuations were fully explored
    pub positions_evaluated: u64,

    /// Cache hits (occupancy already searched from another path)
    pub cache_hits: u64,

    /// Terminal positions reached (no legal jump)
    pub terminal_positions: u64,

    /// Terminal positions by peg count
    pub terminals_by_count: [u64; HOLE_COUNT + 1],

    /// Maximum stack depth reached
    pub max_depth: u64,

    start_time: Instant,
    last_log_time: Instant,
    last_log_positions: u64,
}

impl SearchStats {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            positions_evaluated: 0,
            cache_hits: 0,
            terminal_positions: 0,
            terminals_by_count: [0; HOLE_COUNT + 1],
            max_depth: 0,
            start_time: now,
            last_log_time: now,
            last_log_positions: 0,
        }
    }

    /// Record a terminal position with the given peg count
    pub fn record_terminal(&mut self, pegs: u8) {
        self.terminal_positions += 1;
        if let Some(slot) = self.terminals_by_count.get_mut(pegs as usize) {
            *slot += 1;
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get current positions per second
    pub fn positions_per_sec(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.positions_evaluated as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Check if we should log progress
    pub fn should_log(&self, interval: Duration) -> bool {
        self.last_log_time.elapsed() >= interval
    }

    /// Log progress and reset log timer
    pub fn log_progress(&mut self, cached: usize) {
        let elapsed_total = self.start_time.elapsed().as_secs();

        let since = self.last_log_time.elapsed().as_secs_f64();
        let rate = if since > 0.0 {
            (self.positions_evaluated - self.last_log_positions) as f64 / since
        } else {
            0.0
        };

        tracing::info!(
            "[{:02}:{:02}:{:02}] positions={} cached={} cache_hits={} terminals={} rate={:.0}/s depth={}",
            elapsed_total / 3600,
            (elapsed_total % 3600) / 60,
            elapsed_total % 60,
            self.positions_evaluated,
            cached,
            self.cache_hits,
            self.terminal_positions,
            rate,
            self.max_depth,
        );

        self.last_log_time = Instant::now();
        self.last_log_positions = self.positions_evaluated;
    }

    /// Log final summary
    pub fn log_summary(&self) {
        let tallies: Vec<String> = self
            .terminals_by_count
            .iter()
            .enumerate()
            .filter(|(_, &n)| n > 0)
            .map(|(pegs, n)| format!("{}:{}", pegs, n))
            .collect();

        tracing::debug!(
            positions = self.positions_evaluated,
            cache_hits = self.cache_hits,
            terminals = self.terminal_positions,
            max_depth = self.max_depth,
            elapsed_ms = self.elapsed().as_millis() as u64,
            per_sec = self.positions_per_sec() as u64,
            "search finished, terminals by peg count [{}]",
            tallies.join(" ")
        );
    }
}

impl Default for SearchStats {
    fn default() -> Self {
        Self::new()
    }
}
