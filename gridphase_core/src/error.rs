//! Error types for the GridPhase engine.

use thiserror::Error;

/// A `RunConfig` that failed validation.
///
/// Raised before any stepping begins, so a rejected config never produces
/// partial trajectory or event artifacts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Grid extent is zero or negative
    #[error("{field} must be positive, got {value}")]
    NonPositiveExtent { field: &'static str, value: i64 },

    /// Initial coordinate lies outside [0, size]
    #[error("{field} = {value} lies outside [0, {max}]")]
    InitialPositionOutOfRange {
        field: &'static str,
        value: i64,
        max: i64,
    },

    /// Zero iterations requested
    #[error("steps must be positive")]
    NonPositiveSteps,

    /// Step count above the hard cap
    #[error("steps = {steps} exceeds the limit of {max}")]
    TooManySteps { steps: u64, max: u64 },

    /// Phase-law parameter is zero
    #[error("{field} must be positive")]
    NonPositiveParameter { field: &'static str },

    /// Initial phase outside [0, 1)
    #[error("phase0 = {0} lies outside [0, 1)")]
    PhaseOutOfRange(f64),

    /// Schedule entry placed past the end of the run
    #[error("inversion_schedule[{index}].step = {step} lies outside [0, {steps}]")]
    ScheduleStepOutOfRange { index: usize, step: u64, steps: u64 },

    /// Schedule steps decrease
    #[error("inversion_schedule[{index}].step = {step} precedes previous step {previous}")]
    NonMonotonicSchedule {
        index: usize,
        step: u64,
        previous: u64,
    },

    /// Kind or variant name outside the closed set
    #[error("{field}: unknown kind {name:?}")]
    UnknownKind { field: &'static str, name: String },

    /// Config text that is not a well-formed `RunConfig`
    #[error("malformed config: {0}")]
    Malformed(String),
}

impl ConfigError {
    /// Name of the offending `RunConfig` field.
    pub fn field(&self) -> &'static str {
        match self {
            Self::NonPositiveExtent { field, .. } => *field,
            Self::InitialPositionOutOfRange { field, .. } => *field,
            Self::NonPositiveSteps | Self::TooManySteps { .. } => "steps",
            Self::NonPositiveParameter { field } => *field,
            Self::PhaseOutOfRange(_) => "phase0",
            Self::ScheduleStepOutOfRange { .. } | Self::NonMonotonicSchedule { .. } => {
                "inversion_schedule"
            }
            Self::UnknownKind { field, .. } => *field,
            Self::Malformed(_) => "config",
        }
    }

    /// Creates an unknown-kind error against `field`.
    pub fn unknown_kind(field: &'static str, name: impl Into<String>) -> Self {
        Self::UnknownKind {
            field,
            name: name.into(),
        }
    }
}
