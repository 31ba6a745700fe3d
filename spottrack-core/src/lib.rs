//! spottrack-core: Core types for spot finding and tracking in DV stacks.
//!
//! This crate provides the per-timepoint pixel stack, stack statistics,
//! threshold resolution, spot accumulation and the per-timepoint spot
//! collections consumed by the extraction and linking algorithms.
//!

pub mod collection;
pub mod config;
pub mod error;
pub mod spot;
pub mod stack;
pub mod stats;
pub mod threshold;

pub use collection::{SpotCollection, SpotSeries};
pub use config::{TimeRange, TrackingConfig, WaveSelector};
pub use error::{Error, Result};
pub use spot::{BoundingBox, Spot, SpotAccumulator, WaveSummary};
pub use stack::{alloc_samples, ClipBox, StackDims, VolumeStack};
pub use stats::{sample_sigma, StatsAccumulator, WaveStats, GEOMEAN_OFFSET};
pub use threshold::{Threshold, ThresholdSpec};
