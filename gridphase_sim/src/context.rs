//! Engine context - the single owner of cross-run state.
//!
//! Built once at engine start and dropped at shutdown. Holds the run
//! counter, leaderboards, scorer, spectral monitors and score history that
//! would otherwise be process-wide globals.

use gridphase_core::leaderboard::DEFAULT_CAPACITY;
use gridphase_core::{AnomalyMetrics, AnomalyScoreSet, Leaderboards};
use std::collections::VecDeque;

use crate::monitor::SpectralMonitor;

/// Maximum number of score sets kept for exploration policies.
pub const DEFAULT_HISTORY_LIMIT: usize = 256;

/// Recent score sets, oldest first, plus a running count of every set
/// ever recorded.
#[derive(Debug, Clone)]
pub struct ScoreHistory {
    entries: VecDeque<AnomalyScoreSet>,
    limit: usize,
    recorded: u64,
}

impl Default for ScoreHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl ScoreHistory {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            entries: VecDeque::with_capacity(limit),
            limit,
            recorded: 0,
        }
    }

    /// Appends `scores`, dropping the oldest set past the limit.
    pub fn push(&mut self, scores: AnomalyScoreSet) {
        if self.entries.len() == self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(scores);
        self.recorded += 1;
    }

    /// Most recently recorded set.
    pub fn latest(&self) -> Option<&AnomalyScoreSet> {
        self.entries.back()
    }

    /// Total sets recorded, including those already dropped.
    pub fn recorded(&self) -> u64 {
        self.recorded
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnomalyScoreSet> {
        self.entries.iter()
    }
}

/// Owning context threaded through every run.
pub struct EngineContext {
    /// Master seed for this engine
    seed: u64,

    /// Number of run ids handed out so far
    run_counter: u64,

    /// Per-category rankings, shared across runs
    leaderboards: Leaderboards,

    /// Stateless scorer
    metrics: AnomalyMetrics,

    /// Behaviour-sequence analysers
    monitor: SpectralMonitor,

    /// Recent score sets, oldest first
    history: ScoreHistory,
}

impl EngineContext {
    /// Creates a context with default scoring and `capacity` entries per
    /// category.
    pub fn new(seed: u64, capacity: usize) -> Self {
        Self {
            seed,
            run_counter: 0,
            leaderboards: Leaderboards::new(capacity),
            metrics: AnomalyMetrics::default(),
            monitor: SpectralMonitor::default(),
            history: ScoreHistory::default(),
        }
    }

    /// Replaces the scorer.
    pub fn with_metrics(mut self, metrics: AnomalyMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Replaces the spectral monitor.
    pub fn with_monitor(mut self, monitor: SpectralMonitor) -> Self {
        self.monitor = monitor;
        self
    }

    /// Continues numbering after previously persisted runs.
    pub fn with_run_counter(mut self, start: u64) -> Self {
        self.run_counter = start;
        self
    }

    /// Hands out the next zero-padded run id (`run_000042`).
    pub fn next_run_id(&mut self) -> String {
        let id = format!("run_{:06}", self.run_counter);
        self.run_counter += 1;
        id
    }

    pub fn runs_started(&self) -> u64 {
        self.run_counter
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Derives a deterministic sub-seed for a named subsystem.
    pub fn derive_seed(&self, extension: u64) -> u64 {
        self.seed.wrapping_mul(0x517cc1b727220a95) ^ extension
    }

    pub fn metrics(&self) -> &AnomalyMetrics {
        &self.metrics
    }

    pub fn leaderboards(&self) -> &Leaderboards {
        &self.leaderboards
    }

    pub fn leaderboards_mut(&mut self) -> &mut Leaderboards {
        &mut self.leaderboards
    }

    pub fn monitor(&self) -> &SpectralMonitor {
        &self.monitor
    }

    pub fn monitor_mut(&mut self) -> &mut SpectralMonitor {
        &mut self.monitor
    }

    /// Appends a completed run's scores, dropping the oldest past the limit.
    pub fn record_scores(&mut self, scores: AnomalyScoreSet) {
        self.history.push(scores);
    }

    pub fn history(&self) -> &ScoreHistory {
        &self.history
    }
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::new(42, DEFAULT_CAPACITY)
    }
}
