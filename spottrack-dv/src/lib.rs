//! spottrack-dv: DV (Priism/DeltaVision) file format.
//!
//! This crate knows the on-disk layout of DV microscopy stacks: the fixed
//! 1024-byte header, byte-order detection through the magic field, the
//! per-plane extended header and the interleaving of image planes.
//!
//! # Key Components
//!
//! - [`DvHeader`] - Header decoding, validation and serialization
//! - [`ByteOrder`] - Native or swapped files, threaded through every read
//! - [`PlaneLayout`] - `(z, wave, time)` to plane index mapping
//! - [`ExtendedHeader`] - Per-plane metadata such as elapsed time

mod encode;
mod error;
pub mod extended;
pub mod header;
pub mod layout;

pub use encode::encode_file;
pub use error::{Error, Result};
pub use extended::ExtendedHeader;
pub use header::{
    swap_header_bytes, ByteOrder, DvHeader, BYTES_PER_SAMPLE, DV_MAGIC, HEADER_SIZE, MAX_WAVES,
    MODE_I16,
};
pub use layout::{ImageSequence, PlaneLayout};
