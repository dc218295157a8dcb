//! Run configuration and the per-step records a run produces.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;
use crate::variant::Variant;

/// Hard cap on `steps`; the only cancellation lever for a run.
pub const MAX_STEPS: u64 = 50_000_000;

// =============================================================================
// INVERSION KINDS
// =============================================================================

/// Closed set of scheduled inversion kinds.
///
/// While a kind is active it selects the boundary variant used for stepping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum InversionKind {
    Geometric,
    Spherical,
    Observer,
    Causal,
}

impl InversionKind {
    /// Returns every kind in declaration order.
    pub fn all() -> Vec<InversionKind> {
        vec![
            InversionKind::Geometric,
            InversionKind::Spherical,
            InversionKind::Observer,
            InversionKind::Causal,
        ]
    }

    /// Returns the kind name.
    pub fn name(&self) -> &'static str {
        match self {
            InversionKind::Geometric => "geometric",
            InversionKind::Spherical => "spherical",
            InversionKind::Observer => "observer",
            InversionKind::Causal => "causal",
        }
    }

    /// Boundary variant applied while this kind is active.
    pub fn boundary_variant(&self) -> Variant {
        match self {
            InversionKind::Geometric => Variant::InversionReflect,
            InversionKind::Spherical => Variant::Reflect,
            InversionKind::Observer => Variant::Clamp,
            InversionKind::Causal => Variant::Sticky,
        }
    }
}

impl std::fmt::Display for InversionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for InversionKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "geometric" => Ok(InversionKind::Geometric),
            "spherical" => Ok(InversionKind::Spherical),
            "observer" => Ok(InversionKind::Observer),
            "causal" => Ok(InversionKind::Causal),
            _ => Err(ConfigError::unknown_kind("inversion_schedule", s)),
        }
    }
}

impl TryFrom<String> for InversionKind {
    type Error = ConfigError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}

/// A scheduled switch to `kind` once the run reaches `step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub step: u64,
    pub kind: InversionKind,
}

impl ScheduleEntry {
    pub fn new(step: u64, kind: InversionKind) -> Self {
        Self { step, kind }
    }

    /// Places `kind` at `floor(steps * fraction)`, capped at `steps`.
    pub fn at_fraction(steps: u64, fraction: f64, kind: InversionKind) -> Self {
        let step = ((steps as f64) * fraction.clamp(0.0, 1.0)).floor() as u64;
        Self {
            step: step.min(steps),
            kind,
        }
    }
}

// =============================================================================
// RUN CONFIGURATION
// =============================================================================

/// Immutable simulation parameters for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Grid extent along x; positions live in [0, size_x]
    pub size_x: i64,

    /// Grid extent along y; positions live in [0, size_y]
    pub size_y: i64,

    pub x0: i64,
    pub y0: i64,
    pub vx0: i64,
    pub vy0: i64,

    /// Initial phase in [0, 1)
    pub phase0: f64,

    /// Total iterations; the trajectory has exactly this many states
    pub steps: u64,

    /// Phase law: residue' = residue * multiplier mod modulus
    pub multiplier: u64,
    pub modulus: u64,

    /// Variant used while no inversion kind is active
    pub base_variant: Variant,

    /// Scheduled kind switches, non-decreasing by step
    pub inversion_schedule: Vec<ScheduleEntry>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            size_x: 5,
            size_y: 7,
            x0: 1,
            y0: 1,
            vx0: 1,
            vy0: 1,
            phase0: 0.0,
            steps: 1000,
            multiplier: 7,
            modulus: 1_000_003,
            base_variant: Variant::Reflect,
            inversion_schedule: Vec::new(),
        }
    }
}

impl RunConfig {
    /// Sets the inversion schedule.
    pub fn with_schedule(mut self, schedule: Vec<ScheduleEntry>) -> Self {
        self.inversion_schedule = schedule;
        self
    }

    /// Sets the base variant.
    pub fn with_base_variant(mut self, variant: Variant) -> Self {
        self.base_variant = variant;
        self
    }

    /// Sets the number of steps.
    pub fn with_steps(mut self, steps: u64) -> Self {
        self.steps = steps;
        self
    }

    /// Builds a schedule placing each kind at the matching fraction of `steps`.
    pub fn schedule_at_fractions(mut self, entries: &[(f64, InversionKind)]) -> Self {
        self.inversion_schedule = entries
            .iter()
            .map(|&(fraction, kind)| ScheduleEntry::at_fraction(self.steps, fraction, kind))
            .collect();
        self
    }

    /// Parses a JSON config; absent fields take their defaults.
    ///
    /// Kind names are checked before deserialising so an unknown name is
    /// reported against its field. Values are not validated here.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| ConfigError::Malformed(e.to_string()))?;

        if let Some(name) = value.get("base_variant").and_then(Value::as_str) {
            name.parse::<Variant>()?;
        }
        if let Some(entries) = value.get("inversion_schedule").and_then(Value::as_array) {
            for name in entries.iter().filter_map(|e| e.get("kind")?.as_str()) {
                name.parse::<InversionKind>()?;
            }
        }

        serde_json::from_value(value).map_err(|e| ConfigError::Malformed(e.to_string()))
    }

    /// Checks every invariant a run relies on, naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [("size_x", self.size_x), ("size_y", self.size_y)] {
            if value <= 0 {
                return Err(ConfigError::NonPositiveExtent { field, value });
            }
        }

        for (field, value, max) in [("x0", self.x0, self.size_x), ("y0", self.y0, self.size_y)] {
            if !(0..=max).contains(&value) {
                return Err(ConfigError::InitialPositionOutOfRange { field, value, max });
            }
        }

        if self.steps == 0 {
            return Err(ConfigError::NonPositiveSteps);
        }
        if self.steps > MAX_STEPS {
            return Err(ConfigError::TooManySteps {
                steps: self.steps,
                max: MAX_STEPS,
            });
        }

        if self.multiplier == 0 {
            return Err(ConfigError::NonPositiveParameter { field: "multiplier" });
        }
        if self.modulus == 0 {
            return Err(ConfigError::NonPositiveParameter { field: "modulus" });
        }

        if !(0.0..1.0).contains(&self.phase0) {
            return Err(ConfigError::PhaseOutOfRange(self.phase0));
        }

        let mut previous = 0;
        for (index, entry) in self.inversion_schedule.iter().enumerate() {
            if entry.step > self.steps {
                return Err(ConfigError::ScheduleStepOutOfRange {
                    index,
                    step: entry.step,
                    steps: self.steps,
                });
            }
            if entry.step < previous {
                return Err(ConfigError::NonMonotonicSchedule {
                    index,
                    step: entry.step,
                    previous,
                });
            }
            previous = entry.step;
        }

        Ok(())
    }

    /// Integer phase residue corresponding to `phase0`.
    pub fn initial_residue(&self) -> u64 {
        let residue = (self.phase0 * self.modulus as f64).floor() as u64;
        residue.min(self.modulus.saturating_sub(1))
    }

    /// Upper bound of the grid as a vector.
    pub fn extent(&self) -> Vector2<i64> {
        Vector2::new(self.size_x, self.size_y)
    }
}

// =============================================================================
// STATE & EVENTS
// =============================================================================

/// Snapshot of the moving point after one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub step: u64,
    pub position: Vector2<i64>,
    pub velocity: Vector2<i64>,

    /// Normalised phase in [0, 1)
    pub phase: f64,

    /// Integer residue behind `phase`
    pub residue: u64,

    /// Inversion kind active when this state was produced
    pub inverted: Option<InversionKind>,
}

impl State {
    /// The state at step 0 of a run.
    pub fn initial(config: &RunConfig) -> Self {
        Self {
            step: 0,
            position: Vector2::new(config.x0, config.y0),
            velocity: Vector2::new(config.vx0, config.vy0),
            phase: config.phase0,
            residue: config.initial_residue(),
            inverted: None,
        }
    }

    /// Euclidean speed `sqrt(vx² + vy²)`.
    pub fn speed(&self) -> f64 {
        let vx = self.velocity.x as f64;
        let vy = self.velocity.y as f64;
        (vx * vx + vy * vy).sqrt()
    }

    /// Whether the position lies inside [0, size_x] x [0, size_y].
    pub fn in_bounds(&self, config: &RunConfig) -> bool {
        (0..=config.size_x).contains(&self.position.x)
            && (0..=config.size_y).contains(&self.position.y)
    }
}

/// What triggered an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "source", content = "kind", rename_all = "snake_case")]
pub enum EventType {
    /// A variant applied its boundary rule
    Boundary(Variant),

    /// The scheduler switched the active kind
    Inversion(InversionKind),
}

impl EventType {
    pub fn is_inversion(&self) -> bool {
        matches!(self, EventType::Inversion(_))
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::Boundary(variant) => write!(f, "boundary:{}", variant),
            EventType::Inversion(kind) => write!(f, "inversion:{}", kind),
        }
    }
}

/// One row of a run's event table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub step: u64,
    pub event_type: EventType,
    pub phase_before: f64,
    pub phase_after: f64,
    pub x: i64,
    pub y: i64,
    pub vx: i64,
    pub vy: i64,
}

impl Event {
    /// Creates an event stamped with the position and velocity of `state`.
    pub fn at_state(step: u64, event_type: EventType, phase_before: f64, state: &State) -> Self {
        Self {
            step,
            event_type,
            phase_before,
            phase_after: state.phase,
            x: state.position.x,
            y: state.position.y,
            vx: state.velocity.x,
            vy: state.velocity.y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(RunConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_extent() {
        let config = RunConfig {
            size_y: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.field(), "size_y");
    }

    #[test]
    fn test_validate_rejects_initial_position() {
        let config = RunConfig {
            x0: 6,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InitialPositionOutOfRange {
                field: "x0",
                value: 6,
                max: 5
            })
        );
    }

    #[test]
    fn test_validate_rejects_non_monotonic_schedule() {
        let config = RunConfig::default().with_schedule(vec![
            ScheduleEntry::new(100, InversionKind::Geometric),
            ScheduleEntry::new(50, InversionKind::Causal),
        ]);
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonMonotonicSchedule {
                index: 1,
                step: 50,
                previous: 100
            })
        );
    }

    #[test]
    fn test_validate_rejects_schedule_past_end() {
        let config = RunConfig::default()
            .with_steps(10)
            .with_schedule(vec![ScheduleEntry::new(11, InversionKind::Observer)]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ScheduleStepOutOfRange { index: 0, step: 11, steps: 10 })
        ));
    }

    #[test]
    fn test_schedule_at_fractions() {
        let config = RunConfig::default().with_steps(200_003).schedule_at_fractions(&[
            (0.2, InversionKind::Geometric),
            (0.4, InversionKind::Spherical),
            (0.6, InversionKind::Observer),
            (0.8, InversionKind::Causal),
        ]);
        let steps: Vec<u64> = config.inversion_schedule.iter().map(|e| e.step).collect();
        assert_eq!(steps, vec![40_000, 80_001, 120_001, 160_002]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("Causal".parse::<InversionKind>(), Ok(InversionKind::Causal));
        assert!(matches!(
            "hyperbolic".parse::<InversionKind>(),
            Err(ConfigError::UnknownKind { field: "inversion_schedule", .. })
        ));
    }

    #[test]
    fn test_config_json_roundtrip_with_defaults() {
        let config: RunConfig = serde_json::from_str(r#"{"steps": 42, "base_variant": "sticky"}"#)
            .expect("partial config parses");
        assert_eq!(config.steps, 42);
        assert_eq!(config.base_variant, Variant::Sticky);
        assert_eq!(config.size_x, 5);
    }

    #[test]
    fn test_from_json_names_unknown_kind_field() {
        let json = r#"{"inversion_schedule":[{"step":1,"kind":"hyperbolic"}]}"#;
        let err = RunConfig::from_json(json).unwrap_err();
        assert_eq!(err, ConfigError::unknown_kind("inversion_schedule", "hyperbolic"));
        assert_eq!(err.field(), "inversion_schedule");

        let err = RunConfig::from_json(r#"{"base_variant":"wrap"}"#).unwrap_err();
        assert_eq!(err, ConfigError::unknown_kind("base_variant", "wrap"));
    }

    #[test]
    fn test_from_json_accepts_known_kinds_and_reports_malformed() {
        let config = RunConfig::from_json(
            r#"{"steps": 10, "base_variant": "clamp",
                "inversion_schedule": [{"step": 5, "kind": "causal"}]}"#,
        )
        .unwrap();
        assert_eq!(config.base_variant, Variant::Clamp);
        assert_eq!(
            config.inversion_schedule,
            vec![ScheduleEntry::new(5, InversionKind::Causal)]
        );

        let err = RunConfig::from_json(r#"{"steps": "many"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed(_)));
        assert_eq!(err.field(), "config");
    }

    #[test]
    fn test_serde_rejects_unknown_kind_with_config_message() {
        let err = serde_json::from_str::<InversionKind>(r#""hyperbolic""#).unwrap_err();
        assert!(err.to_string().contains("inversion_schedule"));
    }
}
