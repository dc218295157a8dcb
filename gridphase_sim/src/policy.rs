//! Exploration policies: score history in, next run config out.
//!
//! Policies are pluggable and carry no claims about what the scores mean.
//! The only contract is `history -> next RunConfig`.

use gridphase_core::{AnomalyScoreSet, InversionKind, RunConfig, Variant};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::context::ScoreHistory;

/// Strategy for choosing the next run.
pub trait ExplorationPolicy: Send {
    /// Proposes the next config given the recent score history.
    fn next_config(&mut self, history: &ScoreHistory) -> RunConfig;

    /// Returns the name of this policy.
    fn name(&self) -> &str;
}

/// Always proposes the same config.
pub struct FixedConfig {
    config: RunConfig,
}

impl FixedConfig {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }
}

impl ExplorationPolicy for FixedConfig {
    fn next_config(&mut self, _history: &ScoreHistory) -> RunConfig {
        self.config.clone()
    }

    fn name(&self) -> &str {
        "FixedConfig"
    }
}

#[derive(Debug, Clone, Copy)]
enum Mutation {
    GrowGrid,
    ShrinkGrid,
    TurnVelocity,
    ShiftMultiplier,
    ShuffleKinds,
    SwapBaseVariant,
}

/// Seeded hill-climb over run configs.
///
/// Keeps the last mutation when the run it produced scored `is_optimal`,
/// otherwise reverts to the previous config, then proposes a fresh
/// mutation. Fully deterministic for a given seed and history.
pub struct SeededSweep {
    /// Config proposed most recently
    current: RunConfig,

    /// Config before the active mutation (for rollback)
    previous: RunConfig,

    /// Mutation that produced `current`
    active_mutation: Option<Mutation>,

    /// Score sets recorded at the last proposal
    seen: u64,

    rng: ChaCha8Rng,
}

impl SeededSweep {
    pub fn new(base: RunConfig, seed: u64) -> Self {
        Self {
            current: base.clone(),
            previous: base,
            active_mutation: None,
            seen: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn pick_mutation(&mut self) -> Mutation {
        match self.rng.gen_range(0..6) {
            0 => Mutation::GrowGrid,
            1 => Mutation::ShrinkGrid,
            2 => Mutation::TurnVelocity,
            3 => Mutation::ShiftMultiplier,
            4 => Mutation::ShuffleKinds,
            _ => Mutation::SwapBaseVariant,
        }
    }

    fn apply_mutation(&mut self, mutation: Mutation) {
        let config = &mut self.current;
        match mutation {
            Mutation::GrowGrid => {
                config.size_x += 1;
                config.size_y += 1;
            }
            Mutation::ShrinkGrid => {
                config.size_x = (config.size_x - 1).max(1);
                config.size_y = (config.size_y - 1).max(1);
            }
            Mutation::TurnVelocity => {
                // Quarter turn keeps the speed.
                let (vx, vy) = (config.vx0, config.vy0);
                config.vx0 = -vy;
                config.vy0 = vx;
            }
            Mutation::ShiftMultiplier => {
                let delta = self.rng.gen_range(1..=4);
                config.multiplier = (config.multiplier + delta) % config.modulus.max(2);
                config.multiplier = config.multiplier.max(1);
            }
            Mutation::ShuffleKinds => {
                let kinds = InversionKind::all();
                for entry in &mut config.inversion_schedule {
                    entry.kind = kinds[self.rng.gen_range(0..kinds.len())];
                }
            }
            Mutation::SwapBaseVariant => {
                let variants = Variant::all();
                config.base_variant = variants[self.rng.gen_range(0..variants.len())];
            }
        }

        config.x0 = config.x0.min(config.size_x);
        config.y0 = config.y0.min(config.size_y);
    }
}

impl ExplorationPolicy for SeededSweep {
    fn next_config(&mut self, history: &ScoreHistory) -> RunConfig {
        // Judge the last mutation only once its run has been scored.
        if let Some(mutation) = self.active_mutation {
            if history.recorded() > self.seen {
                let kept = history.latest().map(AnomalyScoreSet::is_optimal).unwrap_or(false);
                if !kept {
                    self.current = self.previous.clone();
                }
                debug!("{:?} {}", mutation, if kept { "kept" } else { "reverted" });
            }
        }
        self.seen = history.recorded();

        self.previous = self.current.clone();
        let mutation = self.pick_mutation();
        self.active_mutation = Some(mutation);
        self.apply_mutation(mutation);

        self.current.clone()
    }

    fn name(&self) -> &str {
        "SeededSweep"
    }
}
