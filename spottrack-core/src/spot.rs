//! Spot accumulation and finalization.
//!
//! A [`SpotAccumulator`] collects moments voxel by voxel while a connected
//! component is consumed. Once the component is complete it is turned into an
//! immutable [`Spot`] by [`SpotAccumulator::finalize`], or reset and reused when
//! the component is too small to keep.
#![allow(clippy::cast_precision_loss)]

use crate::stats::sample_sigma;
use serde::{Deserialize, Serialize};

/// Running intensity moments of one wavelength over a spot's voxels.
#[derive(Debug, Clone, Copy, PartialEq)]
struct WaveMoments {
    sum: f64,
    sum_sq: f64,
    sum_pos: [f64; 3],
    sum_log: f64,
    min: i16,
    max: i16,
}

impl Default for WaveMoments {
    fn default() -> Self {
        Self {
            sum: 0.0,
            sum_sq: 0.0,
            sum_pos: [0.0; 3],
            sum_log: 0.0,
            min: i16::MAX,
            max: i16::MIN,
        }
    }
}

impl WaveMoments {
    #[inline]
    fn add(&mut self, intensity: i16, pos: [f64; 3]) {
        let i = f64::from(intensity);
        self.sum += i;
        self.sum_sq += i * i;
        for (acc, p) in self.sum_pos.iter_mut().zip(pos) {
            *acc += p * i;
        }
        // Non-positive intensities contribute ln(1).
        self.sum_log += i.max(1.0).ln();
        self.min = self.min.min(intensity);
        self.max = self.max.max(intensity);
    }
}

/// Axis-aligned inclusive bounding box in voxel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Lowest `[x, y, z]`.
    pub min: [usize; 3],
    /// Highest `[x, y, z]`.
    pub max: [usize; 3],
}

impl BoundingBox {
    /// Extent along each axis in voxels.
    #[must_use]
    pub fn extent(&self) -> [usize; 3] {
        [
            self.max[0] - self.min[0] + 1,
            self.max[1] - self.min[1] + 1,
            self.max[2] - self.min[2] + 1,
        ]
    }
}

/// Finalized intensity statistics of one wavelength over a spot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaveSummary {
    /// Integrated intensity.
    pub integral: f64,
    /// Mean intensity.
    pub mean: f64,
    /// Geometric mean intensity.
    pub geomean: f64,
    /// Intensity standard deviation.
    pub sigma: f64,
    /// Smallest intensity.
    pub min: i16,
    /// Largest intensity.
    pub max: i16,
    /// Intensity-weighted centroid `[x, y, z]`.
    pub centroid: [f64; 3],
}

/// A finalized connected component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spot {
    /// Run-wide identifier, assigned when the spot joins a series.
    pub id: u32,
    /// Timepoint the spot was found in.
    pub timepoint: usize,
    /// Wavelength index used for detection.
    pub wave: usize,
    /// Number of voxels. Always at least 1.
    pub volume: usize,
    /// Bounding box.
    pub bounds: BoundingBox,
    /// Unweighted mean position `[x, y, z]`.
    pub center: [f64; 3],
    /// Standard deviation of voxel positions.
    pub center_sigma: [f64; 3],
    /// Per-wavelength statistics, indexed by wavelength.
    pub waves: Vec<WaveSummary>,
}

impl Spot {
    /// Statistics for the detection wavelength.
    #[must_use]
    pub fn detection(&self) -> &WaveSummary {
        &self.waves[self.wave]
    }

    /// Intensity centroid at the detection wavelength.
    #[must_use]
    pub fn centroid(&self) -> [f64; 3] {
        self.detection().centroid
    }

    /// Mean intensity at the detection wavelength.
    #[must_use]
    pub fn mean_intensity(&self) -> f64 {
        self.detection().mean
    }
}

/// Accumulates the moments of a spot while its voxels are visited.
#[derive(Debug, Clone)]
pub struct SpotAccumulator {
    wave: usize,
    timepoint: usize,
    volume: usize,
    min: [usize; 3],
    max: [usize; 3],
    sum_pos: [f64; 3],
    sum_pos_sq: [f64; 3],
    moments: Vec<WaveMoments>,
}

impl SpotAccumulator {
    /// Creates an empty accumulator for detection wavelength `wave`.
    #[must_use]
    pub fn new(wave: usize, num_waves: usize, timepoint: usize) -> Self {
        Self {
            wave,
            timepoint,
            volume: 0,
            min: [usize::MAX; 3],
            max: [0; 3],
            sum_pos: [0.0; 3],
            sum_pos_sq: [0.0; 3],
            moments: vec![WaveMoments::default(); num_waves],
        }
    }

    /// Clears all accumulated moments, keeping allocations.
    pub fn reset(&mut self) {
        self.volume = 0;
        self.min = [usize::MAX; 3];
        self.max = [0; 3];
        self.sum_pos = [0.0; 3];
        self.sum_pos_sq = [0.0; 3];
        self.moments.fill(WaveMoments::default());
    }

    /// Voxels accumulated so far.
    #[must_use]
    pub fn volume(&self) -> usize {
        self.volume
    }

    /// Returns true if no voxel has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.volume == 0
    }

    /// Detection wavelength.
    #[must_use]
    pub fn wave(&self) -> usize {
        self.wave
    }

    /// Adds one voxel at `pos`; `intensity_at(w)` yields its sample in wavelength `w`.
    #[inline]
    pub fn add_voxel(&mut self, pos: [usize; 3], intensity_at: impl Fn(usize) -> i16) {
        self.volume += 1;
        let fpos = [pos[0] as f64, pos[1] as f64, pos[2] as f64];
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(pos[axis]);
            self.max[axis] = self.max[axis].max(pos[axis]);
            self.sum_pos[axis] += fpos[axis];
            self.sum_pos_sq[axis] += fpos[axis] * fpos[axis];
        }
        for (wave, moments) in self.moments.iter_mut().enumerate() {
            moments.add(intensity_at(wave), fpos);
        }
    }

    /// Derives the final spot statistics. Returns `None` for an empty accumulator.
    #[must_use]
    pub fn finalize(&self) -> Option<Spot> {
        if self.volume == 0 {
            return None;
        }
        let n = self.volume as f64;
        let center = self.sum_pos.map(|sum| sum / n);
        let mut center_sigma = [0.0; 3];
        for (axis, sigma) in center_sigma.iter_mut().enumerate() {
            *sigma = sample_sigma(self.sum_pos[axis], self.sum_pos_sq[axis], n);
        }

        let waves = self
            .moments
            .iter()
            .map(|m| WaveSummary {
                integral: m.sum,
                mean: m.sum / n,
                geomean: (m.sum_log / n).exp(),
                sigma: sample_sigma(m.sum, m.sum_sq, n),
                min: m.min,
                max: m.max,
                // Fall back to the center of volume when intensities cancel out
                centroid: if m.sum == 0.0 {
                    center
                } else {
                    m.sum_pos.map(|s| s / m.sum)
                },
            })
            .collect();

        Some(Spot {
            id: 0,
            timepoint: self.timepoint,
            wave: self.wave,
            volume: self.volume,
            bounds: BoundingBox {
                min: self.min,
                max: self.max,
            },
            center,
            center_sigma,
            waves,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_does_not_finalize() {
        let acc = SpotAccumulator::new(0, 1, 0);
        assert!(acc.is_empty());
        assert!(acc.finalize().is_none());
    }

    #[test]
    fn test_single_voxel() {
        let mut acc = SpotAccumulator::new(0, 1, 3);
        acc.add_voxel([2, 2, 0], |_| 100);
        let spot = acc.finalize().unwrap();
        assert_eq!(spot.volume, 1);
        assert_eq!(spot.timepoint, 3);
        assert_eq!(spot.bounds.min, [2, 2, 0]);
        assert_eq!(spot.bounds.max, [2, 2, 0]);
        assert_relative_eq!(spot.mean_intensity(), 100.0);
        assert_relative_eq!(spot.detection().geomean, 100.0, epsilon = 1e-9);
        assert_relative_eq!(spot.detection().sigma, 0.0);
        assert_eq!(spot.centroid(), [2.0, 2.0, 0.0]);
    }

    #[test]
    fn test_uniform_intensity_centroid_matches_center() {
        let mut acc = SpotAccumulator::new(0, 2, 0);
        for x in 3..6 {
            for y in 1..3 {
                acc.add_voxel([x, y, 1], |w| if w == 0 { 40 } else { 7 });
            }
        }
        let spot = acc.finalize().unwrap();
        for wave in &spot.waves {
            for axis in 0..3 {
                assert_relative_eq!(wave.centroid[axis], spot.center[axis], epsilon = 1e-12);
            }
        }
        assert_eq!(spot.bounds.extent(), [3, 2, 1]);
    }

    #[test]
    fn test_weighted_centroid() {
        let mut acc = SpotAccumulator::new(0, 1, 0);
        acc.add_voxel([0, 0, 0], |_| 30);
        acc.add_voxel([2, 0, 0], |_| 10);
        let spot = acc.finalize().unwrap();
        // (0*30 + 2*10) / 40
        assert_relative_eq!(spot.centroid()[0], 0.5);
        assert_relative_eq!(spot.center[0], 1.0);
        assert_relative_eq!(spot.detection().integral, 40.0);
    }

    #[test]
    fn test_zero_intensity_centroid_falls_back() {
        let mut acc = SpotAccumulator::new(0, 2, 0);
        acc.add_voxel([1, 0, 0], |w| if w == 0 { 5 } else { 0 });
        acc.add_voxel([3, 0, 0], |w| if w == 0 { 5 } else { 0 });
        let spot = acc.finalize().unwrap();
        assert_eq!(spot.waves[1].centroid, spot.center);
        assert!(!spot.waves[1].centroid[0].is_nan());
    }

    #[test]
    fn test_reset_reuses_accumulator() {
        let mut acc = SpotAccumulator::new(0, 1, 0);
        acc.add_voxel([1, 1, 1], |_| 9);
        acc.reset();
        assert!(acc.is_empty());
        acc.add_voxel([4, 4, 0], |_| 12);
        let spot = acc.finalize().unwrap();
        assert_eq!(spot.volume, 1);
        assert_eq!(spot.bounds.min, [4, 4, 0]);
        assert_relative_eq!(spot.detection().integral, 12.0);
    }
}
