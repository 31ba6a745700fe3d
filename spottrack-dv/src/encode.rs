//! Encoding whole DV files in memory.
//!
//! Used to produce synthetic stacks and to rewrite files in another byte order.

use crate::extended::{extended_bytes_in, ExtendedHeader};
use crate::header::{ByteOrder, DvHeader};
use crate::{Error, Result};

/// Encodes a complete file from per-timepoint stacks.
///
/// Each entry of `stacks` holds one timepoint in canonical `(wave, z, y, x)`
/// order; planes are interleaved according to the header's image sequence.
/// The header's extended header size is taken from `extended`.
///
/// # Errors
/// Returns [`Error::InvalidDimensions`] if the stacks do not match the header.
pub fn encode_file(
    header: &DvHeader,
    extended: Option<&ExtendedHeader>,
    stacks: &[Vec<i16>],
    order: ByteOrder,
) -> Result<Vec<u8>> {
    let mut header = header.clone();
    let extended_bytes = extended.map_or_else(Vec::new, |ext| extended_bytes_in(ext, order));
    header.ext_header_size = i32::try_from(extended_bytes.len())
        .map_err(|_| Error::InvalidDimensions("extended header too large".into()))?;
    header.validate()?;

    let layout = header.layout();
    let dims = header.stack_dims();
    if stacks.len() != layout.num_times {
        return Err(Error::InvalidDimensions(format!(
            "{} stacks for {} timepoints",
            stacks.len(),
            layout.num_times
        )));
    }

    let plane_len = dims.z_stride();
    let mut samples = vec![0i16; layout.num_planes() * plane_len];
    for (time, stack) in stacks.iter().enumerate() {
        if stack.len() != dims.len() {
            return Err(Error::InvalidDimensions(format!(
                "timepoint {time} holds {} samples, expected {}",
                stack.len(),
                dims.len()
            )));
        }
        for (wave, z, plane) in layout.timepoint_planes(time) {
            let src = dims.offset(0, 0, z, wave);
            samples[plane * plane_len..(plane + 1) * plane_len]
                .copy_from_slice(&stack[src..src + plane_len]);
        }
    }
    order.fix_samples(&mut samples);

    let mut bytes = Vec::with_capacity(header.expected_file_size());
    bytes.extend_from_slice(&header.to_bytes_in(order));
    bytes.extend_from_slice(&extended_bytes);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_ne_bytes());
    }
    Ok(bytes)
}
