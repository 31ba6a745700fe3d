//! spottrack-io: Memory-mapped DV input and report output.
//!
//! Stacks are decoded straight out of a memory-mapped file, a window of
//! timepoints at a time, and the resulting spots and trajectories are written
//! as tab-separated tables or JSON.
//!

mod error;
mod pipeline;
mod reader;
pub mod window;
mod writer;

pub use error::{Error, Result};
pub use pipeline::{extract_timepoint, selected_timepoints, track_file, TrackedFile};
pub use reader::{DvFileReader, MappedFileReader};
pub use window::ExtractionWindow;
pub use writer::{Column, ReportFormat, ReportWriter};
