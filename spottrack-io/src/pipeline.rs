//! End-to-end tracking of a DV file.
//!
//! Timepoints are processed in windows sized by [`ExtractionWindow`]. Inside a
//! window every timepoint is loaded, scanned and released in parallel; windows
//! themselves run in order so collections reach the series contiguously. The
//! whole series is linked once every timepoint is done.

use crate::reader::DvFileReader;
use crate::window::ExtractionWindow;
use crate::{Error, Result};
use log::{debug, info};
use rayon::prelude::*;
use spottrack_algorithms::{
    append_collections, ExtractorConfig, SpotExtractor, TrackingRun, TrajectoryLinker,
};
use spottrack_core::{SpotCollection, SpotSeries, TrackingConfig};
use std::ops::RangeInclusive;

/// Result of tracking one file.
#[derive(Clone, Debug)]
pub struct TrackedFile {
    /// Spots and trajectories.
    pub run: TrackingRun,
    /// Detection wavelength index.
    pub wave: usize,
    /// Emission wavelength ids of the file.
    pub wave_ids: Vec<i32>,
    /// Physical voxel size used for distances.
    pub voxel_size: [f64; 3],
}

impl TrackedFile {
    /// Spot collections in timepoint order.
    #[must_use]
    pub fn series(&self) -> &SpotSeries {
        &self.run.series
    }
}

/// Timepoints selected by `config` in a file with `num_times` timepoints.
///
/// # Errors
/// Returns an error if the range lies outside the file.
pub fn selected_timepoints(
    config: &TrackingConfig,
    num_times: usize,
) -> Result<RangeInclusive<usize>> {
    match config.time_range {
        Some(range) => Ok(range.resolve(num_times)?),
        None if num_times > 0 => Ok(0..=num_times - 1),
        None => Err(spottrack_core::Error::EmptyStack.into()),
    }
}

/// Loads and extracts one timepoint, releasing its pixels afterwards.
///
/// # Errors
/// Returns any load or extraction error.
pub fn extract_timepoint(
    reader: &DvFileReader,
    extractor: &SpotExtractor,
    config: &TrackingConfig,
    t: usize,
) -> Result<SpotCollection> {
    let mut stack = reader.load_stack(t)?;
    if let Some(clip) = config.clip {
        stack.set_clip(clip)?;
    }
    let mut collection = extractor.extract(&mut stack)?;
    collection.elapsed_seconds = reader.elapsed_seconds(t);
    Ok(collection)
}

/// Tracks spots through a file.
///
/// # Errors
/// Returns the first error encountered; no partial result is produced.
pub fn track_file(
    reader: &DvFileReader,
    config: &TrackingConfig,
    window: &ExtractionWindow,
) -> Result<TrackedFile> {
    match window.parallelism {
        Some(threads) => rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("cannot start {threads} workers: {e}")))?
            .install(|| track_in_pool(reader, config, window)),
        None => track_in_pool(reader, config, window),
    }
}

fn track_in_pool(
    reader: &DvFileReader,
    config: &TrackingConfig,
    window: &ExtractionWindow,
) -> Result<TrackedFile> {
    config.validate()?;
    let header = reader.header();
    let wave_ids = header.wave_ids();
    let wave = config.wave.resolve_one(&wave_ids)?;
    let timepoints = selected_timepoints(config, reader.num_times())?;
    let per_window = window.timepoints_per_window(reader.stack_bytes())?;
    info!(
        "tracking wave {wave} (id {}) over timepoints {}-{}, {per_window} per window",
        wave_ids.get(wave).copied().unwrap_or_default(),
        timepoints.start(),
        timepoints.end()
    );

    let extractor = SpotExtractor::new(ExtractorConfig::from_tracking(config, wave));
    let all: Vec<usize> = timepoints.collect();
    let mut series = SpotSeries::new();
    for chunk in all.chunks(per_window) {
        let collections = chunk
            .par_iter()
            .map(|&t| extract_timepoint(reader, &extractor, config, t))
            .collect::<Result<Vec<_>>>()?;
        append_collections(&mut series, collections)?;
        debug!("window ending at timepoint {:?} done", chunk.last());
    }

    let voxel_size = header.voxel_size();
    let trajectories = TrajectoryLinker::from_tracking(config, voxel_size).link(&series);
    info!(
        "{} spots over {} timepoints, {} trajectories",
        series.total_spots(),
        series.len(),
        trajectories.len()
    );
    Ok(TrackedFile {
        run: TrackingRun {
            series,
            trajectories,
        },
        wave,
        wave_ids,
        voxel_size,
    })
}
