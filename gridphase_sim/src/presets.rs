//! Named run configurations.

use gridphase_core::{InversionKind, RunConfig, ScheduleEntry, Variant};

/// Preset identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetId {
    /// 5x7 grid, 200003 steps, four kinds at 20/40/60/80 %
    Canonical,

    /// Plain reflection in a wide box, no schedule
    ReflectBox,

    /// Sticky walls; the point settles into a corner
    StickyCorner,

    /// Inversion-reflect base with a kind switch every 10 %
    InversionStorm,

    /// Clamp base with a single observer switch halfway through
    ClampDrift,
}

impl PresetId {
    /// Returns a list of all presets.
    pub fn all() -> Vec<PresetId> {
        vec![
            PresetId::Canonical,
            PresetId::ReflectBox,
            PresetId::StickyCorner,
            PresetId::InversionStorm,
            PresetId::ClampDrift,
        ]
    }

    /// Returns the preset name.
    pub fn name(&self) -> &'static str {
        match self {
            PresetId::Canonical => "canonical",
            PresetId::ReflectBox => "reflect_box",
            PresetId::StickyCorner => "sticky_corner",
            PresetId::InversionStorm => "inversion_storm",
            PresetId::ClampDrift => "clamp_drift",
        }
    }

    /// Returns a description of the preset.
    pub fn description(&self) -> &'static str {
        match self {
            PresetId::Canonical => {
                "5x7 grid, 200003 steps, geometric/spherical/observer/causal at 20/40/60/80%"
            }
            PresetId::ReflectBox => "16x9 reflecting box, velocity (2,1), 5000 steps",
            PresetId::StickyCorner => "sticky walls on an 8x8 grid, 2000 steps",
            PresetId::InversionStorm => {
                "inversion-reflect base, kind switch every 10% of 10000 steps"
            }
            PresetId::ClampDrift => "clamp base, velocity (3,-2), observer switch at 50%",
        }
    }

    /// Builds the preset's run configuration.
    pub fn config(&self) -> RunConfig {
        match self {
            PresetId::Canonical => RunConfig {
                size_x: 5,
                size_y: 7,
                x0: 1,
                y0: 1,
                vx0: 1,
                vy0: 1,
                phase0: 0.0,
                steps: 200_003,
                multiplier: 7,
                modulus: 1_000_003,
                base_variant: Variant::Reflect,
                inversion_schedule: Vec::new(),
            }
            .schedule_at_fractions(&[
                (0.2, InversionKind::Geometric),
                (0.4, InversionKind::Spherical),
                (0.6, InversionKind::Observer),
                (0.8, InversionKind::Causal),
            ]),

            PresetId::ReflectBox => RunConfig {
                size_x: 16,
                size_y: 9,
                x0: 3,
                y0: 2,
                vx0: 2,
                vy0: 1,
                phase0: 0.1,
                steps: 5_000,
                multiplier: 3,
                modulus: 65_537,
                base_variant: Variant::Reflect,
                inversion_schedule: Vec::new(),
            },

            PresetId::StickyCorner => RunConfig {
                size_x: 8,
                size_y: 8,
                x0: 4,
                y0: 1,
                vx0: 1,
                vy0: 2,
                phase0: 0.37,
                steps: 2_000,
                multiplier: 5,
                modulus: 7_919,
                base_variant: Variant::Sticky,
                inversion_schedule: Vec::new(),
            },

            PresetId::InversionStorm => {
                let steps = 10_000;
                let kinds = InversionKind::all();
                let schedule = (1..10)
                    .map(|i| ScheduleEntry::new(steps * i / 10, kinds[(i as usize) % kinds.len()]))
                    .collect();
                RunConfig {
                    size_x: 11,
                    size_y: 13,
                    x0: 5,
                    y0: 6,
                    vx0: 3,
                    vy0: -2,
                    phase0: 0.5,
                    steps,
                    multiplier: 11,
                    modulus: 104_729,
                    base_variant: Variant::InversionReflect,
                    inversion_schedule: schedule,
                }
            }

            PresetId::ClampDrift => RunConfig {
                size_x: 20,
                size_y: 12,
                x0: 10,
                y0: 6,
                vx0: 3,
                vy0: -2,
                phase0: 0.25,
                steps: 4_000,
                multiplier: 13,
                modulus: 32_749,
                base_variant: Variant::Clamp,
                inversion_schedule: Vec::new(),
            }
            .schedule_at_fractions(&[(0.5, InversionKind::Observer)]),
        }
    }
}

impl std::fmt::Display for PresetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for PresetId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "canonical" => Ok(PresetId::Canonical),
            "reflect_box" | "reflectbox" => Ok(PresetId::ReflectBox),
            "sticky_corner" | "stickycorner" => Ok(PresetId::StickyCorner),
            "inversion_storm" | "inversionstorm" => Ok(PresetId::InversionStorm),
            "clamp_drift" | "clampdrift" => Ok(PresetId::ClampDrift),
            _ => Err(format!("Unknown preset: {}", s)),
        }
    }
}
