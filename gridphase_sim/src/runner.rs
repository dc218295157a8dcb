//! Batch runner - executes runs sequentially against one engine context.
//!
//! A run either completes fully (simulate, score, persist, rank) or is
//! rejected at validation. A rejected run is recorded as a failed outcome;
//! it never aborts the rest of the batch.

use gridphase_core::metrics::names;
use gridphase_core::{AnomalyScoreSet, RunConfig};
use tracing::{debug, info, warn};

use crate::context::EngineContext;
use crate::exporter::RunStore;
use crate::policy::ExplorationPolicy;

/// Monitor entity fed with one randomness sample per completed run.
pub const ENGINE_ENTITY: &str = "engine";

/// Result of one run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Zero-padded run identifier
    pub run_id: String,

    /// Whether the config validated and the run completed
    pub passed: bool,

    /// Validation failure, if any
    pub failure_reason: Option<String>,

    /// Steps executed
    pub total_steps: u64,

    /// Events recorded (boundary + inversion)
    pub event_count: usize,

    /// Scheduler-triggered events
    pub inversion_count: usize,

    /// Scores of a completed run
    pub scores: Option<AnomalyScoreSet>,

    /// Categories whose board accepted this run
    pub ranked_in: Vec<String>,

    /// Whether the run artifact reached the store
    pub persisted: bool,
}

impl RunOutcome {
    fn rejected(run_id: String, reason: String) -> Self {
        Self {
            run_id,
            passed: false,
            failure_reason: Some(reason),
            total_steps: 0,
            event_count: 0,
            inversion_count: 0,
            scores: None,
            ranked_in: Vec::new(),
            persisted: false,
        }
    }
}

/// Runs configs one after another, owning the engine context.
pub struct BatchRunner {
    context: EngineContext,
    store: Option<RunStore>,
    iteration: u64,
}

impl BatchRunner {
    /// Creates a runner without persistence.
    pub fn new(context: EngineContext) -> Self {
        Self {
            context,
            store: None,
            iteration: 0,
        }
    }

    /// Persists every completed run to `store`.
    pub fn with_store(mut self, store: RunStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn context(&self) -> &EngineContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut EngineContext {
        &mut self.context
    }

    pub fn store(&self) -> Option<&RunStore> {
        self.store.as_ref()
    }

    /// Tears the runner down, handing back the context.
    pub fn into_context(self) -> EngineContext {
        self.context
    }

    /// Validates, simulates, scores and ranks one config.
    pub fn run_config(&mut self, config: RunConfig) -> RunOutcome {
        let run_id = self.context.next_run_id();
        info!(
            "Starting {}: {}x{} grid, {} steps, base={}",
            run_id, config.size_x, config.size_y, config.steps, config.base_variant
        );

        let record = match gridphase_core::simulate(&config) {
            Ok(record) => record,
            Err(e) => {
                warn!("{} rejected: {} (field {})", run_id, e, e.field());
                return RunOutcome::rejected(run_id, e.to_string());
            }
        };

        let scores = self.context.metrics().score_run(&record);
        if let Some(randomness) = scores.get(names::RANDOMNESS) {
            self.context.monitor_mut().record(ENGINE_ENTITY, randomness);
        }

        let persisted = match &self.store {
            Some(store) => match store.write_run(&run_id, &record, &scores) {
                Ok(_) => true,
                Err(e) => {
                    warn!("{} not persisted: {}", run_id, e);
                    false
                }
            },
            None => false,
        };

        let ranked_in: Vec<String> = self
            .context
            .leaderboards_mut()
            .submit(&run_id, &record, &scores)
            .into_iter()
            .filter(|(_, outcome)| outcome.accepted())
            .map(|(category, _)| category)
            .collect();

        debug!(
            "{} complete: {} events, optimal={}, ranked in {:?}",
            run_id,
            record.events.len(),
            scores.is_optimal(),
            ranked_in
        );

        self.context.record_scores(scores.clone());

        RunOutcome {
            run_id,
            passed: true,
            failure_reason: None,
            total_steps: record.trajectory.len() as u64,
            event_count: record.events.len(),
            inversion_count: record.inversion_count(),
            scores: Some(scores),
            ranked_in,
            persisted,
        }
    }

    /// Runs every config in order; failures stay local to their run.
    pub fn run_batch(&mut self, configs: Vec<RunConfig>) -> Vec<RunOutcome> {
        let outcomes: Vec<RunOutcome> = configs.into_iter().map(|c| self.run_config(c)).collect();
        self.end_iteration();
        outcomes
    }

    /// One driver iteration: ask `policy` for a config and run it.
    pub fn run_iteration(&mut self, policy: &mut dyn ExplorationPolicy) -> RunOutcome {
        let config = policy.next_config(self.context.history());
        let outcome = self.run_config(config);
        self.end_iteration();
        outcome
    }

    /// Runs `iterations` policy-driven iterations back to back.
    pub fn run_policy(
        &mut self,
        policy: &mut dyn ExplorationPolicy,
        iterations: u64,
    ) -> Vec<RunOutcome> {
        info!("Exploring with {} for {} iterations", policy.name(), iterations);
        (0..iterations).map(|_| self.run_iteration(policy)).collect()
    }

    /// Saves every category and prunes unranked run files.
    pub fn checkpoint(&self) -> Result<usize, crate::error::StoreError> {
        match &self.store {
            Some(store) => {
                store.save_all(self.context.leaderboards())?;
                store.retain(self.context.leaderboards())
            }
            None => Ok(0),
        }
    }

    /// Iterations completed so far.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    fn end_iteration(&mut self) {
        self.iteration += 1;
        let iteration = self.iteration;
        for (entity, data) in self.context.monitor_mut().tick(iteration) {
            info!(
                "Spectral [{}] after iteration {}: dominant={:.4}, periodicity={:.3}",
                entity, iteration, data.dominant_frequency, data.periodicity_score
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{FixedConfig, SeededSweep};
    use crate::presets::PresetId;

    fn small_config() -> RunConfig {
        RunConfig {
            steps: 200,
            ..Default::default()
        }
    }

    #[test]
    fn test_run_config_completes_and_ranks() {
        let mut runner = BatchRunner::new(EngineContext::new(42, 5));
        let outcome = runner.run_config(small_config());

        assert!(outcome.passed);
        assert_eq!(outcome.run_id, "run_000000");
        assert_eq!(outcome.total_steps, 200);
        assert_eq!(outcome.ranked_in.len(), 3);
        assert!(!outcome.persisted);
        assert_eq!(runner.context().history().len(), 1);
        assert_eq!(runner.context().leaderboards().query("structure", 10).len(), 1);
    }

    #[test]
    fn test_bad_config_does_not_abort_batch() {
        let mut runner = BatchRunner::new(EngineContext::new(42, 5));
        let bad = RunConfig {
            size_x: -1,
            ..small_config()
        };

        let outcomes = runner.run_batch(vec![small_config(), bad, small_config()]);

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].passed);
        assert!(!outcomes[1].passed);
        assert!(outcomes[1].failure_reason.as_deref().unwrap().contains("size_x"));
        assert!(outcomes[2].passed);
        assert_eq!(outcomes[2].run_id, "run_000002");
        assert_eq!(runner.context().history().len(), 2);
    }

    #[test]
    fn test_policy_iterations_are_deterministic() {
        let run = |seed| {
            let mut runner = BatchRunner::new(EngineContext::new(seed, 10));
            let mut policy = SeededSweep::new(PresetId::ReflectBox.config().with_steps(300), seed);
            runner
                .run_policy(&mut policy, 8)
                .into_iter()
                .map(|o| o.scores)
                .collect::<Vec<_>>()
        };
        assert_eq!(run(5), run(5));
    }

    #[test]
    fn test_monitor_fed_per_run() {
        let mut runner = BatchRunner::new(EngineContext::new(42, 5));
        let mut policy = FixedConfig::new(small_config());
        runner.run_policy(&mut policy, 10);

        assert_eq!(runner.iteration(), 10);
        // Default cadence analyses on iteration 10.
        assert!(runner.context().monitor().latest(ENGINE_ENTITY).is_some());
    }
}
