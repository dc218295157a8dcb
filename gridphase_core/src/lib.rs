//! GridPhase Core - deterministic phase-grid stepping and anomaly ranking
//!
//! A point moves on a bounded integer grid while a modular phase law
//! advances alongside it. Two subsystems live here:
//! 1. **Stepping engine**: boundary variants, the inversion scheduler and
//!    the grid state machine that turns a `RunConfig` into a trajectory and
//!    an event log
//! 2. **Scoring engine**: pure anomaly metrics, a bounded spectral analyser
//!    and capacity-bounded top-K leaderboards per category
//!
//! # Usage
//!
//! ```ignore
//! use gridphase_core::{simulate, AnomalyMetrics, Leaderboards, RunConfig};
//!
//! let record = simulate(&RunConfig::default())?;
//! let scores = AnomalyMetrics::default().score_run(&record);
//!
//! let mut boards = Leaderboards::default();
//! boards.submit("run_000000", &record, &scores);
//! ```

pub mod error;
pub mod types;
pub mod variant;
pub mod scheduler;
pub mod engine;
pub mod metrics;
pub mod spectral;
pub mod leaderboard;

// Re-export key types for convenience
pub use error::ConfigError;
pub use types::{Event, EventType, InversionKind, RunConfig, ScheduleEntry, State, MAX_STEPS};
pub use variant::Variant;
pub use scheduler::InversionScheduler;
pub use engine::{simulate, GridStateMachine, RunRecord};
pub use metrics::{AnomalyMetrics, AnomalyScoreSet, MetricsConfig, PrimePolicy, ScoreChecks};
pub use spectral::{SpectralAnalyzer, SpectralData};
pub use leaderboard::{
    CategoryScorer, InsertOutcome, LeaderboardEntry, Leaderboards, MetricCategory, TopK,
};
