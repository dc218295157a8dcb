//! Capacity-bounded top-K leaderboards, one per category.
//!
//! Entries are kept sorted by score descending; equal scores keep insertion
//! order. A full board only accepts a score strictly greater than its
//! current minimum, and then evicts exactly that minimum. Mutation goes
//! through `&mut self`, so each board has a single writer.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::engine::RunRecord;
use crate::metrics::{names, AnomalyScoreSet};
use crate::types::RunConfig;

/// Default number of entries retained per category.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Categories every `Leaderboards` starts with.
pub const BUILTIN_CATEGORIES: [&str; 3] =
    [names::RANDOMNESS, names::STRUCTURE, names::REEMERGENCE];

/// A ranked run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub run_id: String,

    /// Snapshot of the config that produced the run
    pub config: RunConfig,

    pub scores: AnomalyScoreSet,

    /// Category score used for ranking
    pub score: f64,

    /// Insertion sequence, used for tie-breaks
    #[serde(default)]
    pub seq: u64,
}

impl LeaderboardEntry {
    pub fn new(
        run_id: impl Into<String>,
        config: RunConfig,
        scores: AnomalyScoreSet,
        score: f64,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            config,
            scores,
            score,
            seq: 0,
        }
    }
}

/// Result of offering an entry to a board.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// Board had room
    Inserted,

    /// Board was full; the returned minimum was evicted
    Replaced(Box<LeaderboardEntry>),

    /// Score did not beat the minimum (or was not finite)
    Rejected,
}

impl InsertOutcome {
    pub fn accepted(&self) -> bool {
        !matches!(self, InsertOutcome::Rejected)
    }
}

// =============================================================================
// TOP-K
// =============================================================================

/// A single bounded, sorted ranking.
#[derive(Debug, Clone)]
pub struct TopK {
    capacity: usize,
    entries: Vec<LeaderboardEntry>,
    next_seq: u64,
}

impl TopK {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Vec::new(),
            next_seq: 0,
        }
    }

    /// Offers `entry` to the board.
    pub fn insert(&mut self, mut entry: LeaderboardEntry) -> InsertOutcome {
        if !entry.score.is_finite() {
            return InsertOutcome::Rejected;
        }

        let evicted = if self.entries.len() < self.capacity {
            None
        } else {
            match self.min_score() {
                Some(min) if entry.score > min => self.entries.pop(),
                _ => return InsertOutcome::Rejected,
            }
        };

        entry.seq = self.next_seq;
        self.next_seq += 1;

        // Newest entry goes after every equal score.
        let at = self.entries.partition_point(|existing| existing.score >= entry.score);
        self.entries.insert(at, entry);

        self.debug_check_invariants();

        match evicted {
            Some(evicted) => InsertOutcome::Replaced(Box::new(evicted)),
            None => InsertOutcome::Inserted,
        }
    }

    /// Top `min(n, len)` entries.
    pub fn query(&self, n: usize) -> &[LeaderboardEntry] {
        &self.entries[..n.min(self.entries.len())]
    }

    pub fn entries(&self) -> &[LeaderboardEntry] {
        &self.entries
    }

    pub fn min_score(&self) -> Option<f64> {
        self.entries.last().map(|entry| entry.score)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    fn debug_check_invariants(&self) {
        debug_assert!(self.entries.len() <= self.capacity, "top-k exceeded capacity");
        debug_assert!(
            self.entries.windows(2).all(|pair| {
                pair[0].score > pair[1].score
                    || (pair[0].score == pair[1].score && pair[0].seq < pair[1].seq)
            }),
            "top-k sort order broken"
        );
    }
}

// =============================================================================
// CATEGORIES
// =============================================================================

/// Produces candidate scores for one category from a completed run.
pub trait CategoryScorer: Send + Sync {
    /// Category name.
    fn name(&self) -> &str;

    /// Zero or more candidate scores; each becomes its own entry.
    fn candidates(&self, record: &RunRecord, scores: &AnomalyScoreSet) -> Vec<f64>;
}

/// Ranks runs by one named metric of their score set.
#[derive(Debug, Clone)]
pub struct MetricCategory {
    metric: String,
}

impl MetricCategory {
    pub fn new(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
        }
    }
}

impl CategoryScorer for MetricCategory {
    fn name(&self) -> &str {
        &self.metric
    }

    fn candidates(&self, _record: &RunRecord, scores: &AnomalyScoreSet) -> Vec<f64> {
        scores.get(&self.metric).into_iter().collect()
    }
}

/// Every category's board plus the scorers feeding them.
pub struct Leaderboards {
    capacity: usize,
    boards: BTreeMap<String, TopK>,
    scorers: Vec<Box<dyn CategoryScorer>>,
}

impl Default for Leaderboards {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Leaderboards {
    /// Creates the built-in categories with `capacity` entries each.
    pub fn new(capacity: usize) -> Self {
        let mut leaderboards = Self {
            capacity,
            boards: BTreeMap::new(),
            scorers: Vec::new(),
        };
        for metric in BUILTIN_CATEGORIES {
            leaderboards.register(Box::new(MetricCategory::new(metric)));
        }
        leaderboards
    }

    /// Adds a category fed by `scorer`. Registering an existing name adds a
    /// second scorer to the same board.
    pub fn register(&mut self, scorer: Box<dyn CategoryScorer>) {
        let capacity = self.capacity;
        self.boards
            .entry(scorer.name().to_string())
            .or_insert_with(|| TopK::new(capacity));
        self.scorers.push(scorer);
    }

    /// Offers a scored run to every category. Returns the outcome per
    /// candidate, tagged with its category.
    pub fn submit(
        &mut self,
        run_id: &str,
        record: &RunRecord,
        scores: &AnomalyScoreSet,
    ) -> Vec<(String, InsertOutcome)> {
        let mut outcomes = Vec::new();

        for scorer in &self.scorers {
            let category = scorer.name();
            let Some(board) = self.boards.get_mut(category) else {
                continue;
            };
            for score in scorer.candidates(record, scores) {
                let entry =
                    LeaderboardEntry::new(run_id, record.config.clone(), scores.clone(), score);
                outcomes.push((category.to_string(), board.insert(entry)));
            }
        }

        outcomes
    }

    /// Top `n` entries of `category`; empty when the category is unknown.
    pub fn query(&self, category: &str, n: usize) -> &[LeaderboardEntry] {
        self.boards
            .get(category)
            .map(|board| board.query(n))
            .unwrap_or(&[])
    }

    pub fn category(&self, name: &str) -> Option<&TopK> {
        self.boards.get(name)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.boards.keys().map(String::as_str)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Replaces a category's contents with previously persisted entries,
    /// re-ranked through the normal insert path.
    pub fn restore(&mut self, category: &str, entries: Vec<LeaderboardEntry>) {
        let mut board = TopK::new(self.capacity);
        let mut entries = entries;
        entries.sort_by_key(|entry| entry.seq);
        for entry in entries {
            board.insert(entry);
        }
        self.boards.insert(category.to_string(), board);
    }

    /// Run ids present on any board.
    pub fn referenced_runs(&self) -> BTreeSet<String> {
        self.boards
            .values()
            .flat_map(|board| board.entries().iter().map(|entry| entry.run_id.clone()))
            .collect()
    }
}
