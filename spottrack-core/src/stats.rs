//! Streaming intensity statistics.
#![allow(clippy::cast_precision_loss)]

use serde::{Deserialize, Serialize};

/// Offset added to every sample before taking its logarithm, so that the
/// geometric mean of a stack containing zero or small negative values stays defined.
pub const GEOMEAN_OFFSET: f64 = 100.0;

/// Aggregate statistics of one wavelength of a stack.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaveStats {
    /// Smallest sample.
    pub min: i16,
    /// Largest sample.
    pub max: i16,
    /// Arithmetic mean.
    pub mean: f64,
    /// Geometric mean, computed on offset samples and shifted back.
    pub geomean: f64,
    /// Sample standard deviation.
    pub sigma: f64,
    /// Number of samples.
    pub count: usize,
}

/// Sample standard deviation from running sums.
///
/// Uses `sqrt((Σx² − (Σx)²/N) / (N−1))`. Returns 0 for fewer than two samples
/// and clamps tiny negative variances caused by rounding.
#[inline]
#[must_use]
pub fn sample_sigma(sum: f64, sum_sq: f64, n: f64) -> f64 {
    if n < 2.0 {
        return 0.0;
    }
    let variance = (sum_sq - sum * sum / n) / (n - 1.0);
    if variance > 0.0 {
        variance.sqrt()
    } else {
        0.0
    }
}

/// Single-pass accumulator behind [`WaveStats`].
#[derive(Debug, Clone, Copy)]
pub struct StatsAccumulator {
    sum: f64,
    sum_sq: f64,
    sum_log: f64,
    min: i16,
    max: i16,
    count: usize,
}

impl Default for StatsAccumulator {
    fn default() -> Self {
        Self {
            sum: 0.0,
            sum_sq: 0.0,
            sum_log: 0.0,
            min: i16::MAX,
            max: i16::MIN,
            count: 0,
        }
    }
}

impl StatsAccumulator {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one sample.
    #[inline]
    pub fn push(&mut self, sample: i16) {
        let x = f64::from(sample);
        self.sum += x;
        self.sum_sq += x * x;
        // Samples at or below -GEOMEAN_OFFSET would hit ln(<=0); they count as ln(1).
        self.sum_log += (x + GEOMEAN_OFFSET).max(1.0).ln();
        self.min = self.min.min(sample);
        self.max = self.max.max(sample);
        self.count += 1;
    }

    /// Adds every sample of a slice.
    pub fn extend(&mut self, samples: &[i16]) {
        for &sample in samples {
            self.push(sample);
        }
    }

    /// Number of samples seen so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Derives the final statistics, or `None` when no sample was pushed.
    #[must_use]
    pub fn finish(&self) -> Option<WaveStats> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        Some(WaveStats {
            min: self.min,
            max: self.max,
            mean: self.sum / n,
            geomean: (self.sum_log / n).exp() - GEOMEAN_OFFSET,
            sigma: sample_sigma(self.sum, self.sum_sq, n),
            count: self.count,
        })
    }
}

impl WaveStats {
    /// Computes the statistics of a sample slice in one pass.
    #[must_use]
    pub fn from_samples(samples: &[i16]) -> Option<Self> {
        let mut acc = StatsAccumulator::new();
        acc.extend(samples);
        acc.finish()
    }

    /// How many standard deviations `value` lies above the mean.
    #[must_use]
    pub fn sigmas_above_mean(&self, value: f64) -> f64 {
        if self.sigma > 0.0 {
            (value - self.mean) / self.sigma
        } else {
            0.0
        }
    }

    /// How many standard deviations `value` lies above the geometric mean.
    #[must_use]
    pub fn sigmas_above_geomean(&self, value: f64) -> f64 {
        if self.sigma > 0.0 {
            (value - self.geomean) / self.sigma
        } else {
            0.0
        }
    }
}
