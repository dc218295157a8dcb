//! Bounded spectral analyser over a sliding window of scalar samples.
//!
//! The transform is a truncated DFT: only the first `min(N, 64)` bins are
//! evaluated, so one `analyze()` call costs `O(N * 64)` even when the
//! window is full. Callers should analyse at a coarse cadence rather than
//! after every push.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::f64::consts::PI;

/// Default window capacity (most recent samples kept).
pub const DEFAULT_WINDOW: usize = 1000;

/// Maximum number of frequency bins evaluated per analysis.
pub const MAX_BINS: usize = 64;

/// Frequency-domain summary of the current window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectralData {
    /// Bin frequencies in cycles per sample (`k / N`)
    pub frequencies: Vec<f64>,

    /// Normalised magnitude per bin, parallel to `frequencies`
    pub magnitudes: Vec<f64>,

    /// Frequency of the strongest non-DC bin
    pub dominant_frequency: f64,

    /// Frequencies whose magnitude exceeds half the largest bin (DC included)
    pub harmonics: Vec<f64>,

    /// `|harmonics| / bins`, in [0, 1]
    pub periodicity_score: f64,
}

impl SpectralData {
    pub fn bins(&self) -> usize {
        self.frequencies.len()
    }
}

/// Sliding-window spectral analyser, one per monitored entity.
#[derive(Debug, Clone)]
pub struct SpectralAnalyzer {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl Default for SpectralAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl SpectralAnalyzer {
    /// Creates an analyser keeping at most `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a sample, evicting the oldest once the window is full.
    pub fn push(&mut self, sample: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn extend<I: IntoIterator<Item = f64>>(&mut self, samples: I) {
        for sample in samples {
            self.push(sample);
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Computes the spectral summary of the current window.
    pub fn analyze(&self) -> SpectralData {
        let n = self.samples.len();
        if n == 0 {
            return SpectralData::default();
        }

        let bins = n.min(MAX_BINS);
        let mut frequencies = Vec::with_capacity(bins);
        let mut magnitudes = Vec::with_capacity(bins);

        for k in 0..bins {
            let mut real = 0.0;
            let mut imag = 0.0;
            for (t, sample) in self.samples.iter().enumerate() {
                let angle = 2.0 * PI * (k * t) as f64 / n as f64;
                real += sample * angle.cos();
                imag -= sample * angle.sin();
            }
            frequencies.push(k as f64 / n as f64);
            magnitudes.push((real * real + imag * imag).sqrt() / n as f64);
        }

        // Peak over non-DC bins; first maximum wins.
        let mut peak_bin = None;
        let mut peak = 0.0;
        for (k, &magnitude) in magnitudes.iter().enumerate().skip(1) {
            if peak_bin.is_none() || magnitude > peak {
                peak_bin = Some(k);
                peak = magnitude;
            }
        }

        let dominant_frequency = peak_bin.map(|k| frequencies[k]).unwrap_or(0.0);

        // Harmonics are judged against the maximum over every bin, DC included.
        let max_magnitude = magnitudes.iter().copied().fold(0.0, f64::max);
        let harmonics: Vec<f64> = if max_magnitude > 0.0 {
            magnitudes
                .iter()
                .zip(&frequencies)
                .filter(|(&magnitude, _)| magnitude > max_magnitude / 2.0)
                .map(|(_, &frequency)| frequency)
                .collect()
        } else {
            Vec::new()
        };

        let periodicity_score = harmonics.len() as f64 / bins as f64;

        SpectralData {
            frequencies,
            magnitudes,
            dominant_frequency,
            harmonics,
            periodicity_score,
        }
    }
}
