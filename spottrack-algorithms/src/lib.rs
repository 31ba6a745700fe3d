//! spottrack-algorithms: Spot extraction and trajectory linking.
//!
//! This crate provides:
//! - **Flood fill** - 6-connected component extraction with a heap worklist
//! - **Spot extraction** - threshold scan, volume filter and finalization per timepoint
//! - **Trajectory linking** - nearest-neighbor matching between consecutive timepoints
//!
#![warn(missing_docs)]

mod extract;
pub mod flood;
mod linker;
mod processing;

pub use extract::{ExtractionStatistics, ExtractorConfig, SpotExtractor};
pub use flood::{FloodFill, WorkStack, WORK_CHUNK};
pub use linker::{LinkerConfig, SpotLink, Trajectories, TrajectoryLinker, TrajectorySummary};
pub use processing::{append_collections, extract_and_link, extract_stacks, TrackingRun};
