//! Error types for spottrack-core.

use thiserror::Error;

/// Result type alias for spottrack operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types.
///
/// Every variant is fatal for a tracking run: trajectory linking assumes a
/// complete, contiguous sequence of timepoints.
#[derive(Error, Debug)]
pub enum Error {
    /// Unparseable or inconsistent volume data.
    #[error("format error: {0}")]
    Format(String),

    /// Pixel data shorter than the header-declared dimensions.
    #[error("short read at timepoint {timepoint}: expected {expected} samples, got {actual}")]
    ShortRead {
        timepoint: usize,
        expected: usize,
        actual: usize,
    },

    /// A pixel buffer, work stack or spot table could not be allocated.
    #[error("allocation of {what} ({elements} elements) failed")]
    Allocation { what: &'static str, elements: usize },

    /// Invalid threshold spec, wavelength, volume bounds and similar.
    #[error("configuration error: {0}")]
    Config(String),

    /// Wavelength index outside the stack.
    #[error("wavelength index {wave} out of range (stack has {num_waves})")]
    WavelengthOutOfRange { wave: usize, num_waves: usize },

    /// Timepoint index outside the file.
    #[error("timepoint {timepoint} out of range (file has {num_times})")]
    TimepointOutOfRange { timepoint: usize, num_times: usize },

    /// Statistics requested on a stack with no pixels.
    #[error("cannot compute statistics of an empty stack")]
    EmptyStack,
}

impl Error {
    /// Shorthand for [`Error::Config`].
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

