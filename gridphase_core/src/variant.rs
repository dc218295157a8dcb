//! Boundary variants - the per-step strategy of the grid state machine.
//!
//! Every variant shares one contract: add velocity to position, resolve any
//! coordinate that left `[0, size]` with the variant's boundary rule, then
//! advance the phase residue. Dispatch is a plain `match` over a closed enum.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{Event, EventType, InversionKind, RunConfig, State};

/// Closed set of boundary behaviours.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Variant {
    /// Flip the crossing velocity component and clamp
    #[default]
    Reflect,

    /// Clamp the coordinate, keep velocity
    Clamp,

    /// Clamp the coordinate and zero the crossing velocity component
    Sticky,

    /// Map the coordinate through its reciprocal about the grid centre
    /// and flip the crossing velocity component
    InversionReflect,
}

impl Variant {
    /// Returns every variant in declaration order.
    pub fn all() -> Vec<Variant> {
        vec![
            Variant::Reflect,
            Variant::Clamp,
            Variant::Sticky,
            Variant::InversionReflect,
        ]
    }

    /// Returns the variant name.
    pub fn name(&self) -> &'static str {
        match self {
            Variant::Reflect => "reflect",
            Variant::Clamp => "clamp",
            Variant::Sticky => "sticky",
            Variant::InversionReflect => "inversion_reflect",
        }
    }

    /// Advances `state` by one step.
    ///
    /// Returns the next state (stamped with `active_kind`) and a boundary
    /// event when at least one axis crossed the grid edge. The event carries
    /// the post-transform position and velocity and the phase on both sides
    /// of the update.
    pub fn step(
        &self,
        state: &State,
        config: &RunConfig,
        active_kind: Option<InversionKind>,
    ) -> (State, Option<Event>) {
        let extent = config.extent();
        let mut position = state.position;
        let mut velocity = state.velocity;
        let mut crossed = false;

        for axis in 0..2 {
            let size = extent[axis];
            let tentative = state.position[axis].saturating_add(state.velocity[axis]);

            if (0..=size).contains(&tentative) {
                position[axis] = tentative;
                continue;
            }

            crossed = true;
            let (coord, vel) = self.resolve_axis(tentative, velocity[axis], size);
            position[axis] = coord;
            velocity[axis] = vel;
        }

        let residue = advance_residue(state.residue, config.multiplier, config.modulus);
        let next = State {
            step: state.step + 1,
            position,
            velocity,
            phase: residue as f64 / config.modulus as f64,
            residue,
            inverted: active_kind,
        };

        let event = crossed
            .then(|| Event::at_state(next.step, EventType::Boundary(*self), state.phase, &next));

        (next, event)
    }

    /// Applies the boundary rule to one out-of-range coordinate.
    fn resolve_axis(&self, coord: i64, velocity: i64, size: i64) -> (i64, i64) {
        match self {
            Variant::Reflect => (coord.clamp(0, size), -velocity),
            Variant::Clamp => (coord.clamp(0, size), velocity),
            Variant::Sticky => (coord.clamp(0, size), 0),
            Variant::InversionReflect => (invert_about_center(coord, size), -velocity),
        }
    }
}

/// Circle inversion of `coord` about the centre `c = size / 2` with radius `c`.
///
/// For any `coord` outside `[0, size]` the image lies strictly inside the
/// grid; the result is rounded back onto the lattice.
fn invert_about_center(coord: i64, size: i64) -> i64 {
    let center = size as f64 / 2.0;
    let offset = coord as f64 - center;
    if offset == 0.0 {
        return coord.clamp(0, size);
    }
    let image = center + center * center / offset;
    (image.round() as i64).clamp(0, size)
}

/// `residue * multiplier mod modulus` without overflow.
pub fn advance_residue(residue: u64, multiplier: u64, modulus: u64) -> u64 {
    if modulus == 0 {
        return 0;
    }
    ((residue as u128 * multiplier as u128) % modulus as u128) as u64
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Variant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reflect" => Ok(Variant::Reflect),
            "clamp" => Ok(Variant::Clamp),
            "sticky" => Ok(Variant::Sticky),
            "inversion_reflect" | "inversion-reflect" | "inversionreflect" => {
                Ok(Variant::InversionReflect)
            }
            _ => Err(ConfigError::unknown_kind("base_variant", s)),
        }
    }
}

impl TryFrom<String> for Variant {
    type Error = ConfigError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}
