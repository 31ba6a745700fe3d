//! Per-timepoint spot extraction.
//!
//! Scans the detection wavelength of a stack in `z, y, x` order inside the clip
//! box. Each voxel above threshold seeds a flood fill; the resulting component
//! is kept when its volume passes the volume filter and discarded otherwise,
//! reusing the same accumulator for the next seed.

use crate::flood::{FloodFill, WorkStack};
use log::debug;
use spottrack_core::{
    Error, Result, SpotAccumulator, SpotCollection, ThresholdSpec, TrackingConfig, VolumeStack,
};

/// Spot extraction configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtractorConfig {
    /// Detection wavelength index.
    pub wave: usize,
    /// Threshold, resolved against each stack.
    pub threshold: ThresholdSpec,
    /// Smallest component kept, in voxels.
    pub min_volume: usize,
    /// Largest component kept, in voxels.
    pub max_volume: Option<usize>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            wave: 0,
            threshold: ThresholdSpec::Mean { sigmas: 0.0 },
            min_volume: 1,
            max_volume: None,
        }
    }
}

impl ExtractorConfig {
    /// Takes threshold and volume limits from a tracking run for wavelength `wave`.
    #[must_use]
    pub fn from_tracking(config: &TrackingConfig, wave: usize) -> Self {
        Self {
            wave,
            threshold: config.threshold,
            min_volume: config.min_volume,
            max_volume: config.max_volume,
        }
    }

    /// Returns true if a component of `volume` voxels is kept.
    #[inline]
    #[must_use]
    pub fn accepts_volume(&self, volume: usize) -> bool {
        volume >= self.min_volume && self.max_volume.is_none_or(|max| volume <= max)
    }
}

/// Counters of one extraction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExtractionStatistics {
    /// Components kept.
    pub spots_kept: usize,
    /// Components rejected by the volume filter.
    pub spots_rejected: usize,
    /// Voxels consumed by all components.
    pub voxels_visited: usize,
    /// Deepest work stack seen.
    pub peak_work: usize,
}

/// Finds the spots of one stack.
#[derive(Clone, Debug, Default)]
pub struct SpotExtractor {
    config: ExtractorConfig,
}

impl SpotExtractor {
    /// Creates an extractor.
    #[must_use]
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extracts all spots of `stack`.
    ///
    /// Statistics of every wavelength are computed before the first voxel is
    /// visited, because the fill overwrites detection samples in place.
    ///
    /// # Errors
    /// Returns [`Error::WavelengthOutOfRange`] for a bad detection wavelength,
    /// [`Error::EmptyStack`] or [`Error::Allocation`].
    pub fn extract(&self, stack: &mut VolumeStack) -> Result<SpotCollection> {
        self.extract_with_stats(stack).map(|(collection, _)| collection)
    }

    /// Extracts all spots of `stack` and reports counters.
    ///
    /// # Errors
    /// See [`SpotExtractor::extract`].
    pub fn extract_with_stats(
        &self,
        stack: &mut VolumeStack,
    ) -> Result<(SpotCollection, ExtractionStatistics)> {
        let wave = self.config.wave;
        let stats = stack.all_stats()?;
        let detection = stats.get(wave).ok_or(Error::WavelengthOutOfRange {
            wave,
            num_waves: stats.len(),
        })?;
        let threshold = self.config.threshold.resolve(detection);
        let timepoint = stack.timepoint();
        let dims = *stack.dims();
        let clip = *stack.clip();
        debug!(
            "timepoint {timepoint}: wave {wave} threshold {:.2} (mean {:.2}, sigma {:.2})",
            threshold.value, detection.mean, detection.sigma
        );

        let fill = FloodFill::new(dims, clip, wave, threshold)?;
        let mut work = WorkStack::new()?;
        let mut spot = SpotAccumulator::new(wave, dims.num_waves, timepoint);
        let mut collection = SpotCollection::new(timepoint, threshold, stats);
        let mut counters = ExtractionStatistics::default();

        let pixels = stack.pixels_mut();
        for z in clip.min[2]..=clip.max[2] {
            for y in clip.min[1]..=clip.max[1] {
                let row = dims.offset(0, y, z, wave);
                for x in clip.min[0]..=clip.max[0] {
                    let offset = row + x;
                    if !threshold.exceeds(pixels[offset]) {
                        continue;
                    }
                    fill.eat(pixels, offset, &mut spot, &mut work)?;
                    counters.voxels_visited += spot.volume();
                    if self.config.accepts_volume(spot.volume()) {
                        if let Some(found) = spot.finalize() {
                            collection.spots.try_reserve(1).map_err(|_| {
                                Error::Allocation {
                                    what: "spot list",
                                    elements: collection.spots.len() + 1,
                                }
                            })?;
                            collection.spots.push(found);
                            counters.spots_kept += 1;
                        }
                    } else {
                        counters.spots_rejected += 1;
                    }
                    spot.reset();
                }
            }
        }
        counters.peak_work = work.peak();

        debug!(
            "timepoint {timepoint}: {} spots kept, {} rejected by volume",
            counters.spots_kept, counters.spots_rejected
        );
        Ok((collection, counters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use spottrack_core::{ClipBox, StackDims};

    fn stack_with(dims: StackDims, voxels: &[([usize; 3], i16)]) -> VolumeStack {
        let mut stack = VolumeStack::zeroed(dims, 0).unwrap();
        for &([x, y, z], value) in voxels {
            stack.set(x, y, z, 0, value);
        }
        stack
    }

    fn literal(threshold: i32, min_volume: usize) -> SpotExtractor {
        SpotExtractor::new(ExtractorConfig {
            threshold: ThresholdSpec::Literal(threshold),
            min_volume,
            ..ExtractorConfig::default()
        })
    }

    #[test]
    fn test_single_voxel_stack() {
        let mut stack = stack_with(StackDims::new(4, 4, 4, 1), &[([2, 2, 0], 100)]);
        let collection = literal(50, 1).extract(&mut stack).unwrap();
        assert_eq!(collection.len(), 1);
        let spot = &collection.spots[0];
        assert_eq!(spot.volume, 1);
        assert_eq!(spot.bounds.min, [2, 2, 0]);
        assert_eq!(spot.bounds.max, [2, 2, 0]);
        assert_relative_eq!(spot.mean_intensity(), 100.0);
    }

    #[test]
    fn test_stats_taken_before_fill() {
        let mut stack = stack_with(StackDims::new(4, 4, 1, 1), &[([1, 1, 0], 160)]);
        let collection = literal(50, 1).extract(&mut stack).unwrap();
        assert_eq!(collection.stats[0].max, 160);
        assert_relative_eq!(collection.stats[0].mean, 10.0);
    }

    #[test]
    fn test_volume_filter() {
        let mut stack = stack_with(
            StackDims::new(8, 8, 1, 1),
            &[
                ([0, 0, 0], 90),
                ([4, 4, 0], 90),
                ([5, 4, 0], 90),
                ([4, 5, 0], 90),
            ],
        );
        let extractor = literal(10, 2);
        let (collection, counters) = extractor.extract_with_stats(&mut stack).unwrap();
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.spots[0].volume, 3);
        assert_eq!(counters.spots_rejected, 1);
        assert_eq!(counters.voxels_visited, 4);
    }

    #[test]
    fn test_max_volume_filter() {
        let mut stack = stack_with(
            StackDims::new(8, 1, 1, 1),
            &[([0, 0, 0], 90), ([1, 0, 0], 90), ([5, 0, 0], 90)],
        );
        let extractor = SpotExtractor::new(ExtractorConfig {
            threshold: ThresholdSpec::Literal(10),
            max_volume: Some(1),
            ..ExtractorConfig::default()
        });
        let collection = extractor.extract(&mut stack).unwrap();
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.spots[0].bounds.min, [5, 0, 0]);
    }

    #[test]
    fn test_relative_threshold() {
        let mut stack = stack_with(StackDims::new(10, 10, 1, 1), &[([3, 3, 0], 500)]);
        let extractor = SpotExtractor::new(ExtractorConfig {
            threshold: ThresholdSpec::Mean { sigmas: 3.0 },
            ..ExtractorConfig::default()
        });
        let collection = extractor.extract(&mut stack).unwrap();
        assert_eq!(collection.len(), 1);
        assert!(collection.threshold.value > 5.0);
    }

    #[test]
    fn test_clip_limits_scan() {
        let mut stack = stack_with(
            StackDims::new(6, 6, 1, 1),
            &[([0, 0, 0], 90), ([4, 4, 0], 90)],
        );
        stack.set_clip(ClipBox::new([2, 2, 0], [5, 5, 0])).unwrap();
        let collection = literal(10, 1).extract(&mut stack).unwrap();
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.spots[0].bounds.min, [4, 4, 0]);
    }

    #[test]
    fn test_bad_wave() {
        let mut stack = stack_with(StackDims::new(2, 2, 1, 1), &[]);
        let extractor = SpotExtractor::new(ExtractorConfig {
            wave: 3,
            ..ExtractorConfig::default()
        });
        assert!(matches!(
            extractor.extract(&mut stack),
            Err(Error::WavelengthOutOfRange { wave: 3, .. })
        ));
    }
}
