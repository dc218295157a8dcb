//! Anomaly Metrics Engine
//! ======================
//!
//! Scores a completed run from its `(trajectory, events, config)` triple.
//! Scoring is pure: the same inputs always yield a bit-identical
//! `AnomalyScoreSet`. Degenerate inputs (empty trajectory, zero variance,
//! zero steps) map to defined finite values so downstream ranking always
//! compares real numbers.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::engine::RunRecord;
use crate::spectral::{SpectralAnalyzer, DEFAULT_WINDOW};
use crate::types::{Event, RunConfig, State};

/// Metric names used as keys in `AnomalyScoreSet::scores`.
pub mod names {
    pub const RANDOMNESS: &str = "randomness";
    pub const STRUCTURE: &str = "structure";
    pub const REEMERGENCE: &str = "reemergence";
    pub const EVENT_DENSITY: &str = "event_density";
    pub const TRAJECTORY_VARIANCE: &str = "trajectory_variance";
    pub const PHASE_PERIODICITY: &str = "phase_periodicity";
    pub const INVERSION_FREQUENCY: &str = "inversion_frequency";
    pub const VELOCITY_ANOMALY: &str = "velocity_anomaly";
    pub const CHAOS_INDEX: &str = "chaos_index";
    pub const SPECTRAL_PERIODICITY: &str = "spectral_periodicity";
}

/// Finite stand-in for `1 / 0` when the phase sequence has no variance.
pub const PERIODICITY_CAP: f64 = 1e12;

/// Variances at or below this count as zero.
const VARIANCE_EPSILON: f64 = 1e-18;

// =============================================================================
// CONFIGURATION & POLICIES
// =============================================================================

/// Thresholds for the derived checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Maximum number of distinct event spacings for `band_ok`
    pub band_limit: usize,

    /// Number of trailing phases fed to the spectral analyser
    pub spectral_window: usize,

    /// Minimum periodicity score for `spectral_ok`
    pub spectral_threshold: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            band_limit: 3,
            spectral_window: DEFAULT_WINDOW,
            spectral_threshold: 0.1,
        }
    }
}

/// Decides whether a run's event spacings are prime-structured.
pub trait PrimePolicy: Send + Sync {
    /// `spacings` are the distinct gaps between consecutive event steps,
    /// ascending.
    fn accepts(&self, spacings: &[u64]) -> bool;

    /// Returns the name of this policy.
    fn name(&self) -> &str;
}

/// Accepts when there is at least one spacing and every distinct spacing
/// is prime.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllPrimeSpacings;

impl PrimePolicy for AllPrimeSpacings {
    fn accepts(&self, spacings: &[u64]) -> bool {
        !spacings.is_empty() && spacings.iter().all(|&gap| is_prime(gap))
    }

    fn name(&self) -> &str {
        "AllPrimeSpacings"
    }
}

/// Trial-division primality test.
pub fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n < 4 {
        return true;
    }
    if n % 2 == 0 || n % 3 == 0 {
        return false;
    }
    let mut i = 5u64;
    while i.saturating_mul(i) <= n {
        if n % i == 0 || n % (i + 2) == 0 {
            return false;
        }
        i += 6;
    }
    true
}

// =============================================================================
// SCORE SET
// =============================================================================

/// Derived boolean checks of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreChecks {
    pub band_ok: bool,
    pub prime_ok: bool,
    pub spectral_ok: bool,

    /// `band_ok && prime_ok && spectral_ok`
    pub is_optimal: bool,
}

/// Named scores of one completed run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalyScoreSet {
    pub scores: BTreeMap<String, f64>,
    pub checks: ScoreChecks,
}

impl AnomalyScoreSet {
    /// Returns the named score.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.scores.get(name).copied()
    }

    pub fn is_optimal(&self) -> bool {
        self.checks.is_optimal
    }

    fn insert(&mut self, name: &str, value: f64) {
        debug_assert!(value.is_finite(), "{} = {} is not finite", name, value);
        self.scores.insert(name.to_string(), value);
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// Stateless scorer; holds only thresholds and the prime policy.
pub struct AnomalyMetrics {
    config: MetricsConfig,
    prime_policy: Box<dyn PrimePolicy>,
}

impl Default for AnomalyMetrics {
    fn default() -> Self {
        Self::new(MetricsConfig::default())
    }
}

impl AnomalyMetrics {
    pub fn new(config: MetricsConfig) -> Self {
        Self {
            config,
            prime_policy: Box::new(AllPrimeSpacings),
        }
    }

    /// Replaces the prime-structure policy.
    pub fn with_prime_policy(mut self, policy: Box<dyn PrimePolicy>) -> Self {
        self.prime_policy = policy;
        self
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// Scores a completed run.
    pub fn score_run(&self, record: &RunRecord) -> AnomalyScoreSet {
        self.score(&record.trajectory, &record.events, &record.config)
    }

    /// Scores a `(trajectory, events, config)` triple.
    pub fn score(
        &self,
        trajectory: &[State],
        events: &[Event],
        config: &RunConfig,
    ) -> AnomalyScoreSet {
        let steps = config.steps as f64;
        let mut set = AnomalyScoreSet::default();

        let randomness = ratio(events.len() as f64, steps);
        set.insert(names::RANDOMNESS, randomness);
        set.insert(names::STRUCTURE, 1.0 - randomness);
        set.insert(names::EVENT_DENSITY, ratio(events.len() as f64, steps));

        let last_inversion = events
            .iter()
            .filter(|event| event.event_type.is_inversion())
            .map(|event| event.step)
            .max()
            .unwrap_or(0);
        set.insert(
            names::REEMERGENCE,
            config.steps.saturating_sub(last_inversion) as f64,
        );

        let inversions = events
            .iter()
            .filter(|event| event.event_type.is_inversion())
            .count();
        set.insert(names::INVERSION_FREQUENCY, ratio(inversions as f64, steps));

        let xs: Vec<f64> = trajectory.iter().map(|s| s.position.x as f64).collect();
        let ys: Vec<f64> = trajectory.iter().map(|s| s.position.y as f64).collect();
        set.insert(
            names::TRAJECTORY_VARIANCE,
            population_variance(&xs) + population_variance(&ys),
        );

        let phases: Vec<f64> = trajectory.iter().map(|s| s.phase).collect();
        let phase_variance = population_variance(&phases);
        let phase_periodicity = if phase_variance <= VARIANCE_EPSILON {
            PERIODICITY_CAP
        } else {
            (1.0 / phase_variance).min(PERIODICITY_CAP)
        };
        set.insert(names::PHASE_PERIODICITY, phase_periodicity);

        let speeds: Vec<f64> = trajectory.iter().map(State::speed).collect();
        set.insert(names::VELOCITY_ANOMALY, mean(&speeds));

        let unique: HashSet<(i64, i64)> = trajectory
            .iter()
            .map(|s| (s.position.x, s.position.y))
            .collect();
        set.insert(names::CHAOS_INDEX, ratio(steps, unique.len() as f64));

        let spacings = event_spacings(events);
        let band_ok = spacings.len() <= self.config.band_limit;
        let prime_ok = self.prime_policy.accepts(&spacings);

        let periodicity = self.phase_spectrum_score(&phases);
        set.insert(names::SPECTRAL_PERIODICITY, periodicity);
        let spectral_ok = periodicity >= self.config.spectral_threshold;

        set.checks = ScoreChecks {
            band_ok,
            prime_ok,
            spectral_ok,
            is_optimal: band_ok && prime_ok && spectral_ok,
        };
        set
    }

    /// Periodicity score of the trailing phase window.
    fn phase_spectrum_score(&self, phases: &[f64]) -> f64 {
        let window = self.config.spectral_window.max(1);
        let start = phases.len().saturating_sub(window);
        let mut analyzer = SpectralAnalyzer::new(window);
        analyzer.extend(phases[start..].iter().copied());
        analyzer.analyze().periodicity_score
    }
}

/// Distinct gaps between consecutive distinct event steps, ascending.
///
/// Events sharing a step count as one occurrence.
pub fn event_spacings(events: &[Event]) -> Vec<u64> {
    let steps: BTreeSet<u64> = events.iter().map(|event| event.step).collect();
    let gaps: BTreeSet<u64> = steps
        .iter()
        .zip(steps.iter().skip(1))
        .map(|(a, b)| b - a)
        .collect();
    gaps.into_iter().collect()
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

fn mean(values: &[f64]) -> f64 {
    ratio(values.iter().sum(), values.len() as f64)
}

fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mu = mean(values);
    values.iter().map(|v| (v - mu) * (v - mu)).sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::simulate;
    use crate::types::{EventType, InversionKind, ScheduleEntry};
    use crate::variant::Variant;
    use approx::assert_relative_eq;

    fn event(step: u64, event_type: EventType) -> Event {
        Event {
            step,
            event_type,
            phase_before: 0.0,
            phase_after: 0.0,
            x: 0,
            y: 0,
            vx: 0,
            vy: 0,
        }
    }

    #[test]
    fn test_is_prime() {
        let primes: Vec<u64> = (0..30).filter(|&n| is_prime(n)).collect();
        assert_eq!(primes, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
        assert!(is_prime(1_000_003));
        assert!(!is_prime(1_000_001));
    }

    #[test]
    fn test_event_spacings_dedupes_steps() {
        let events = vec![
            event(3, EventType::Inversion(InversionKind::Causal)),
            event(3, EventType::Boundary(Variant::Sticky)),
            event(8, EventType::Boundary(Variant::Sticky)),
            event(13, EventType::Boundary(Variant::Sticky)),
            event(20, EventType::Boundary(Variant::Sticky)),
        ];
        assert_eq!(event_spacings(&events), vec![5, 7]);
    }

    #[test]
    fn test_empty_inputs_are_finite() {
        let config = RunConfig {
            steps: 10,
            ..Default::default()
        };
        let set = AnomalyMetrics::default().score(&[], &[], &config);

        assert_eq!(set.get(names::RANDOMNESS), Some(0.0));
        assert_eq!(set.get(names::STRUCTURE), Some(1.0));
        assert_eq!(set.get(names::REEMERGENCE), Some(10.0));
        assert_eq!(set.get(names::CHAOS_INDEX), Some(0.0));
        assert_eq!(set.get(names::PHASE_PERIODICITY), Some(PERIODICITY_CAP));
        assert!(set.scores.values().all(|v| v.is_finite()));
        assert!(set.checks.band_ok);
        assert!(!set.checks.prime_ok);
        assert!(!set.checks.is_optimal);
    }

    #[test]
    fn test_scores_for_simulated_run() {
        let config = RunConfig {
            steps: 100,
            ..Default::default()
        }
        .with_schedule(vec![ScheduleEntry::new(40, InversionKind::Observer)]);
        let record = simulate(&config).unwrap();
        let set = AnomalyMetrics::default().score_run(&record);

        let events = record.events.len() as f64;
        assert_relative_eq!(set.get(names::RANDOMNESS).unwrap(), events / 100.0);
        assert_relative_eq!(set.get(names::EVENT_DENSITY).unwrap(), events / 100.0);
        assert_eq!(set.get(names::REEMERGENCE), Some(60.0));
        assert_relative_eq!(set.get(names::INVERSION_FREQUENCY).unwrap(), 0.01);
        // Reflect and Clamp never change speed away from the diagonal.
        assert_relative_eq!(
            set.get(names::VELOCITY_ANOMALY).unwrap(),
            2f64.sqrt(),
            epsilon = 1e-12
        );
        // phase0 = 0 keeps the residue at zero for the whole run.
        assert_eq!(set.get(names::PHASE_PERIODICITY), Some(PERIODICITY_CAP));
        assert!(!set.checks.spectral_ok);
    }

    #[test]
    fn test_phase_offset_keeps_spectral_check_off() {
        let n = 256;
        let trajectory: Vec<State> = (0..n)
            .map(|t| State {
                step: t as u64,
                position: nalgebra::Vector2::new(0, 0),
                velocity: nalgebra::Vector2::new(0, 0),
                phase: 0.5 + 0.1 * (2.0 * std::f64::consts::PI * 8.0 * t as f64 / n as f64).sin(),
                residue: 0,
                inverted: None,
            })
            .collect();
        let config = RunConfig {
            steps: n as u64,
            ..Default::default()
        };

        let set = AnomalyMetrics::default().score(&trajectory, &[], &config);
        // Only the DC bin clears half the maximum magnitude.
        assert_relative_eq!(set.get(names::SPECTRAL_PERIODICITY).unwrap(), 1.0 / 64.0);
        assert!(!set.checks.spectral_ok);
        assert!(!set.checks.is_optimal);
    }

    #[test]
    fn test_scoring_is_pure() {
        let config = RunConfig {
            steps: 500,
            phase0: 0.123,
            ..Default::default()
        };
        let record = simulate(&config).unwrap();
        let metrics = AnomalyMetrics::default();

        let first = metrics.score_run(&record);
        let second = metrics.score_run(&record);
        assert_eq!(first, second);
        for (name, value) in &first.scores {
            assert_eq!(value.to_bits(), second.scores[name].to_bits());
        }
    }

    struct AcceptAll;

    impl PrimePolicy for AcceptAll {
        fn accepts(&self, _spacings: &[u64]) -> bool {
            true
        }

        fn name(&self) -> &str {
            "AcceptAll"
        }
    }

    #[test]
    fn test_prime_policy_is_pluggable() {
        let metrics = AnomalyMetrics::new(MetricsConfig {
            spectral_threshold: 0.0,
            ..Default::default()
        })
        .with_prime_policy(Box::new(AcceptAll));
        let config = RunConfig {
            steps: 10,
            ..Default::default()
        };
        let set = metrics.score(&[], &[], &config);
        assert!(set.checks.prime_ok);
        assert!(set.checks.is_optimal);
    }
}
