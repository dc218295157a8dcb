//! Per-entity spectral monitors.
//!
//! Each monitored entity owns its own `SpectralAnalyzer`. Samples are
//! recorded every iteration, but analysis only runs every `cadence`th
//! iteration to keep the `O(window * 64)` cost off the hot path.

use gridphase_core::spectral::DEFAULT_WINDOW;
use gridphase_core::{SpectralAnalyzer, SpectralData};
use std::collections::BTreeMap;
use tracing::debug;

/// Default number of iterations between analyses.
pub const DEFAULT_CADENCE: u64 = 10;

/// A set of spectral analysers keyed by entity name.
#[derive(Debug, Clone)]
pub struct SpectralMonitor {
    window: usize,
    cadence: u64,
    analyzers: BTreeMap<String, SpectralAnalyzer>,
    latest: BTreeMap<String, SpectralData>,
}

impl Default for SpectralMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_CADENCE)
    }
}

impl SpectralMonitor {
    pub fn new(window: usize, cadence: u64) -> Self {
        Self {
            window,
            cadence: cadence.max(1),
            analyzers: BTreeMap::new(),
            latest: BTreeMap::new(),
        }
    }

    /// Appends a sample to `entity`'s window, creating it on first use.
    pub fn record(&mut self, entity: &str, sample: f64) {
        let window = self.window;
        self.analyzers
            .entry(entity.to_string())
            .or_insert_with(|| SpectralAnalyzer::new(window))
            .push(sample);
    }

    /// Analyses every entity when `iteration` falls on the cadence.
    ///
    /// Returns the fresh results; off-cadence iterations return nothing.
    pub fn tick(&mut self, iteration: u64) -> Vec<(String, SpectralData)> {
        if iteration % self.cadence != 0 {
            return Vec::new();
        }

        let mut fresh = Vec::with_capacity(self.analyzers.len());
        for (entity, analyzer) in &self.analyzers {
            let data = analyzer.analyze();
            debug!(
                "Spectral [{}]: dominant={:.4} periodicity={:.3} ({} samples)",
                entity,
                data.dominant_frequency,
                data.periodicity_score,
                analyzer.len()
            );
            self.latest.insert(entity.clone(), data.clone());
            fresh.push((entity.clone(), data));
        }
        fresh
    }

    /// Most recent analysis of `entity`.
    pub fn latest(&self, entity: &str) -> Option<&SpectralData> {
        self.latest.get(entity)
    }

    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.analyzers.keys().map(String::as_str)
    }

    pub fn cadence(&self) -> u64 {
        self.cadence
    }
}
