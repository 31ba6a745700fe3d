//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Memory mapping error.
    #[error("memory mapping error: {0}")]
    MmapError(String),

    /// File shorter than its header promises.
    #[error("short read at timepoint {timepoint}: need {expected} bytes, file has {available}")]
    ShortRead {
        timepoint: usize,
        expected: usize,
        available: usize,
    },

    /// Invalid DV file.
    #[error("invalid DV file: {0}")]
    Format(#[from] spottrack_dv::Error),

    /// Invalid window or report settings.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] spottrack_core::Error),

    /// Report serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
