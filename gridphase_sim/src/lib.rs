//! GridPhase Simulation Harness
//!
//! Drives the core engine the way a long-running explorer would:
//! - **Context**: one owning `EngineContext` holds the run counter,
//!   leaderboards, scorer and spectral monitors for the whole session
//! - **Runner**: runs execute strictly one after another; a run that fails
//!   validation is recorded and skipped, never fatal to the batch
//! - **Policy**: a pluggable `ExplorationPolicy` maps score history to the
//!   next `RunConfig`
//! - **Store**: run artifacts and leaderboard categories persist as JSON
//!
//! # Usage
//!
//! ```ignore
//! use gridphase_sim::{BatchRunner, EngineContext, PresetId, SeededSweep};
//!
//! let context = EngineContext::new(42, 1000);
//! let mut runner = BatchRunner::new(context);
//!
//! let mut policy = SeededSweep::new(PresetId::ReflectBox.config(), 42);
//! let outcomes = runner.run_policy(&mut policy, 100);
//! ```

mod context;
mod error;
mod exporter;
mod monitor;
mod runner;
pub mod policy;
pub mod presets;

pub use context::{EngineContext, ScoreHistory};
pub use error::StoreError;
pub use exporter::{RunExport, RunStore};
pub use monitor::SpectralMonitor;
pub use runner::{BatchRunner, RunOutcome, ENGINE_ENTITY};
pub use policy::{ExplorationPolicy, FixedConfig, SeededSweep};
pub use presets::PresetId;
