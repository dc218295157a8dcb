//! Grid state machine - drives one run from `RunConfig` to trajectory and
//! event log.
//!
//! Per step index `t` in `1..steps`:
//! 1. the scheduler is advanced to `t`; each fired entry switches the
//!    active kind and records an inversion event;
//! 2. the active variant steps the state (boundary rule + phase law);
//! 3. the new state is appended, plus its boundary event if one fired.
//!
//! Index 0 is the initial state; entries scheduled at exactly `steps` fire
//! once after the loop. For a fixed config the output is bit-reproducible.

use tracing::debug;

use crate::error::ConfigError;
use crate::scheduler::InversionScheduler;
use crate::types::{Event, EventType, RunConfig, State};
use crate::variant::Variant;

/// Everything a completed run produced.
#[derive(Debug, Clone)]
pub struct RunRecord {
    /// Config that produced this run
    pub config: RunConfig,

    /// One state per step, `trajectory[0]` is the initial state
    pub trajectory: Vec<State>,

    /// Boundary and inversion events, non-decreasing by step
    pub events: Vec<Event>,

    /// Step of the last schedule entry applied during the run
    pub last_inversion_step: Option<u64>,
}

impl RunRecord {
    /// Number of scheduler-triggered events.
    pub fn inversion_count(&self) -> usize {
        self.events
            .iter()
            .filter(|event| event.event_type.is_inversion())
            .count()
    }

    pub fn final_state(&self) -> Option<&State> {
        self.trajectory.last()
    }
}

/// Owns the mutable state of a single run.
pub struct GridStateMachine {
    config: RunConfig,
    scheduler: InversionScheduler,
    state: State,
    trajectory: Vec<State>,
    events: Vec<Event>,
}

/// Upper bound on the trajectory slots reserved before stepping; longer
/// runs grow the buffer on demand.
const TRAJECTORY_PREALLOC: usize = 1 << 16;

impl GridStateMachine {
    /// Validates `config` and prepares a run. Nothing is stepped yet.
    pub fn new(config: RunConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let scheduler = InversionScheduler::new(&config.inversion_schedule);
        let state = State::initial(&config);
        let capacity = usize::try_from(config.steps)
            .unwrap_or(TRAJECTORY_PREALLOC)
            .min(TRAJECTORY_PREALLOC);

        Ok(Self {
            config,
            scheduler,
            state,
            trajectory: Vec::with_capacity(capacity),
            events: Vec::new(),
        })
    }

    /// Variant in force for the currently active kind.
    pub fn active_variant(&self) -> Variant {
        self.scheduler
            .active_kind()
            .map(|kind| kind.boundary_variant())
            .unwrap_or(self.config.base_variant)
    }

    /// Executes every step and returns the completed record.
    pub fn run(mut self) -> RunRecord {
        debug!(
            "Run start: {}x{} grid, {} steps, {} scheduled inversions, base={}",
            self.config.size_x,
            self.config.size_y,
            self.config.steps,
            self.config.inversion_schedule.len(),
            self.config.base_variant
        );

        self.apply_schedule(0);
        self.state.inverted = self.scheduler.active_kind();
        self.trajectory.push(self.state.clone());

        for step in 1..self.config.steps {
            self.apply_schedule(step);

            let variant = self.active_variant();
            let (next, event) =
                variant.step(&self.state, &self.config, self.scheduler.active_kind());

            if let Some(event) = event {
                self.events.push(event);
            }
            self.state = next;
            self.trajectory.push(self.state.clone());
        }

        // Entries placed at exactly `steps` have no state of their own.
        self.apply_schedule(self.config.steps);

        debug_assert_eq!(self.trajectory.len() as u64, self.config.steps);
        debug_assert!(self.scheduler.is_exhausted());

        debug!(
            "Run complete: {} states, {} events",
            self.trajectory.len(),
            self.events.len()
        );

        RunRecord {
            last_inversion_step: self.scheduler.last_applied_step(),
            config: self.config,
            trajectory: self.trajectory,
            events: self.events,
        }
    }

    /// Fires schedule entries due at `step`, recording one event per entry.
    fn apply_schedule(&mut self, step: u64) {
        for entry in self.scheduler.advance(step) {
            self.events.push(Event::at_state(
                step,
                EventType::Inversion(entry.kind),
                self.state.phase,
                &self.state,
            ));
        }
    }
}

/// Validates and runs `config` to completion.
pub fn simulate(config: &RunConfig) -> Result<RunRecord, ConfigError> {
    Ok(GridStateMachine::new(config.clone())?.run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InversionKind, ScheduleEntry};
    use nalgebra::Vector2;

    #[test]
    fn test_long_run_does_not_reserve_full_trajectory() {
        let config = RunConfig::default().with_steps(crate::types::MAX_STEPS);
        let machine = GridStateMachine::new(config).unwrap();
        assert!(machine.trajectory.capacity() <= TRAJECTORY_PREALLOC);

        let short = GridStateMachine::new(RunConfig::default().with_steps(10)).unwrap();
        assert!(short.trajectory.capacity() >= 10);
    }

    #[test]
    fn test_trajectory_length_and_initial_state() {
        let config = RunConfig {
            steps: 50,
            phase0: 0.25,
            ..Default::default()
        };
        let record = simulate(&config).unwrap();

        assert_eq!(record.trajectory.len(), 50);
        let first = &record.trajectory[0];
        assert_eq!(first.position, Vector2::new(1, 1));
        assert_eq!(first.velocity, Vector2::new(1, 1));
        assert_eq!(first.phase, 0.25);
        assert_eq!(first.step, 0);
    }

    #[test]
    fn test_single_step_run() {
        let config = RunConfig {
            steps: 1,
            ..Default::default()
        }
        .with_schedule(vec![ScheduleEntry::new(1, InversionKind::Causal)]);
        let record = simulate(&config).unwrap();

        assert_eq!(record.trajectory.len(), 1);
        assert_eq!(record.inversion_count(), 1);
        assert_eq!(record.last_inversion_step, Some(1));
    }

    #[test]
    fn test_schedule_at_zero_marks_initial_state() {
        let config = RunConfig::default()
            .with_schedule(vec![ScheduleEntry::new(0, InversionKind::Observer)]);
        let record = simulate(&config).unwrap();

        assert_eq!(record.trajectory[0].inverted, Some(InversionKind::Observer));
        assert_eq!(record.events[0].step, 0);
        assert_eq!(
            record.events[0].event_type,
            EventType::Inversion(InversionKind::Observer)
        );
    }

    #[test]
    fn test_kind_switch_changes_variant() {
        let config = RunConfig {
            steps: 100,
            ..Default::default()
        }
        .with_schedule(vec![ScheduleEntry::new(10, InversionKind::Causal)]);
        let record = simulate(&config).unwrap();

        // Sticky eventually zeroes both components once each wall is hit.
        let last = record.final_state().unwrap();
        assert_eq!(last.velocity, Vector2::new(0, 0));
        assert_eq!(last.inverted, Some(InversionKind::Causal));
        assert!(record
            .events
            .iter()
            .filter(|e| e.step > 10)
            .all(|e| e.event_type == EventType::Boundary(Variant::Sticky)));
    }

    #[test]
    fn test_invalid_config_produces_no_run() {
        let config = RunConfig {
            steps: 0,
            ..Default::default()
        };
        assert_eq!(simulate(&config).unwrap_err(), ConfigError::NonPositiveSteps);
    }

    #[test]
    fn test_reflect_bounces_between_walls() {
        let config = RunConfig {
            size_x: 3,
            size_y: 3,
            x0: 0,
            y0: 0,
            steps: 10,
            ..Default::default()
        };
        let record = simulate(&config).unwrap();
        let xs: Vec<i64> = record.trajectory.iter().map(|s| s.position.x).collect();
        assert_eq!(xs, vec![0, 1, 2, 3, 3, 2, 1, 0, 0, 1]);
    }
}
