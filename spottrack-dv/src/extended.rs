//! Extended header: per-plane acquisition metadata.
//!
//! Each image plane owns one section of `nint` 4-byte integers followed by
//! `nreal` 4-byte floats. The second float of a section holds the elapsed
//! acquisition time in seconds.
#![allow(clippy::cast_sign_loss)]

use crate::header::{ByteOrder, DvHeader, HEADER_SIZE};
use byteorder::{ByteOrder as _, NativeEndian};
use log::warn;

/// Float slot holding the elapsed time in seconds.
pub const ELAPSED_SECONDS_SLOT: usize = 1;

/// Decoded per-plane sections of the extended header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtendedHeader {
    ints_per_section: usize,
    floats_per_section: usize,
    ints: Vec<i32>,
    floats: Vec<f32>,
}

impl ExtendedHeader {
    /// Decodes the extended header that follows the fixed header.
    ///
    /// `file` must start with the fixed header. Returns an empty header when the
    /// file declares no sections or when the block is too small to hold one
    /// section per plane.
    #[must_use]
    pub fn parse(header: &DvHeader, file: &[u8]) -> Self {
        let ints_per_section = header.ints_per_section.max(0) as usize;
        let floats_per_section = header.floats_per_section.max(0) as usize;
        let section_words = ints_per_section + floats_per_section;
        let planes = header.layout().num_planes();
        if section_words == 0 || planes == 0 {
            return Self::default();
        }

        let declared = header.ext_header_size.max(0) as usize;
        let needed = section_words * 4 * planes;
        if declared < needed {
            warn!(
                "extended header holds {declared} bytes, {planes} sections need {needed}; ignoring it"
            );
            return Self::default();
        }
        let Some(block) = file.get(HEADER_SIZE..HEADER_SIZE + needed) else {
            warn!("file ends inside the extended header; ignoring it");
            return Self::default();
        };

        let mut words = block.to_vec();
        header.byte_order.fix_words(&mut words);

        let mut ints = Vec::with_capacity(ints_per_section * planes);
        let mut floats = Vec::with_capacity(floats_per_section * planes);
        for section in words.chunks_exact(section_words * 4) {
            let (int_bytes, float_bytes) = section.split_at(ints_per_section * 4);
            ints.extend(int_bytes.chunks_exact(4).map(NativeEndian::read_i32));
            floats.extend(float_bytes.chunks_exact(4).map(NativeEndian::read_f32));
        }

        Self {
            ints_per_section,
            floats_per_section,
            ints,
            floats,
        }
    }

    /// Returns true when no section was decoded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ints.is_empty() && self.floats.is_empty()
    }

    /// Integers of the section for `plane`.
    #[must_use]
    pub fn ints(&self, plane: usize) -> Option<&[i32]> {
        let start = plane.checked_mul(self.ints_per_section)?;
        self.ints.get(start..start + self.ints_per_section)
    }

    /// Floats of the section for `plane`.
    #[must_use]
    pub fn floats(&self, plane: usize) -> Option<&[f32]> {
        let start = plane.checked_mul(self.floats_per_section)?;
        self.floats.get(start..start + self.floats_per_section)
    }

    /// Elapsed acquisition time of `plane` in seconds.
    #[must_use]
    pub fn elapsed_seconds(&self, plane: usize) -> Option<f64> {
        self.floats(plane)?
            .get(ELAPSED_SECONDS_SLOT)
            .map(|&seconds| f64::from(seconds))
    }

    /// Serializes sections in native order, as written after the fixed header.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let sections = if self.ints_per_section > 0 {
            self.ints.len() / self.ints_per_section
        } else if self.floats_per_section > 0 {
            self.floats.len() / self.floats_per_section
        } else {
            0
        };
        let section_bytes = (self.ints_per_section + self.floats_per_section) * 4;
        let mut bytes = vec![0u8; sections * section_bytes];
        let mut cursor = 0;
        for section in 0..sections {
            for &value in self.ints(section).unwrap_or_default() {
                NativeEndian::write_i32(&mut bytes[cursor..], value);
                cursor += 4;
            }
            for &value in self.floats(section).unwrap_or_default() {
                NativeEndian::write_f32(&mut bytes[cursor..], value);
                cursor += 4;
            }
        }
        bytes
    }

    /// Builds sections from per-plane values, for writing synthetic files.
    #[must_use]
    pub fn from_sections(
        ints_per_section: usize,
        floats_per_section: usize,
        sections: &[(Vec<i32>, Vec<f32>)],
    ) -> Self {
        let mut ints = Vec::with_capacity(ints_per_section * sections.len());
        let mut floats = Vec::with_capacity(floats_per_section * sections.len());
        for (section_ints, section_floats) in sections {
            ints.extend(
                section_ints
                    .iter()
                    .copied()
                    .chain(std::iter::repeat(0))
                    .take(ints_per_section),
            );
            floats.extend(
                section_floats
                    .iter()
                    .copied()
                    .chain(std::iter::repeat(0.0))
                    .take(floats_per_section),
            );
        }
        Self {
            ints_per_section,
            floats_per_section,
            ints,
            floats,
        }
    }

    /// Size in bytes when serialized.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        (self.ints.len() + self.floats.len()) * 4
    }
}

/// Swaps a serialized extended header into the given byte order.
#[must_use]
pub fn extended_bytes_in(extended: &ExtendedHeader, order: ByteOrder) -> Vec<u8> {
    let mut bytes = extended.to_bytes();
    order.fix_words(&mut bytes);
    bytes
}
