//! DV-specific error types.

use thiserror::Error;

/// Result type for DV operations.
pub type Result<T> = std::result::Result<T, Error>;

/// DV-specific error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Magic field matches neither native nor byte-swapped order.
    #[error("bad DV magic: read {native} (native) / {swapped} (swapped), expected -16224")]
    BadMagic { native: i16, swapped: i16 },

    /// Fewer than 1024 header bytes available.
    #[error("truncated DV header: {0} bytes, need 1024")]
    TruncatedHeader(usize),

    /// Pixel mode other than 16-bit signed.
    #[error("unsupported DV pixel mode {0} (only mode 1, 16-bit signed, is supported)")]
    UnsupportedMode(i32),

    /// Inconsistent dimensions or image sequence.
    #[error("invalid DV dimensions: {0}")]
    InvalidDimensions(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<Error> for spottrack_core::Error {
    fn from(err: Error) -> Self {
        spottrack_core::Error::Format(err.to_string())
    }
}
