//! The fixed 1024-byte DV header.
//!
//! The header is a packed record of 2- and 4-byte numbers plus two byte arrays
//! (`extra` and the ten 80-character labels). Files are written in the byte
//! order of the machine that produced them; the magic field at offset 96 tells
//! the reader whether every numeric field must be reversed.
#![allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]

use crate::layout::{ImageSequence, PlaneLayout};
use crate::{Error, Result};
use byteorder::{ByteOrder as _, NativeEndian};
use serde::{Deserialize, Serialize};
use spottrack_core::StackDims;

/// Size of the fixed header.
pub const HEADER_SIZE: usize = 1024;

/// Value of the magic field in native order.
pub const DV_MAGIC: i16 = -16224;

/// Pixel mode for 16-bit signed samples.
pub const MODE_I16: i32 = 1;

/// Bytes per sample for [`MODE_I16`].
pub const BYTES_PER_SAMPLE: usize = 2;

/// Maximum number of wavelengths a header can describe.
pub const MAX_WAVES: usize = 5;

const LABEL_LEN: usize = 80;
const NUM_LABELS: usize = 10;

/// Field byte offsets.
mod offsets {
    pub const NUM_COL: usize = 0;
    pub const NUM_ROW: usize = 4;
    pub const NUM_IMAGES: usize = 8;
    pub const MODE: usize = 12;
    pub const START: usize = 16;
    pub const SAMPLING: usize = 28;
    pub const CELL: usize = 40;
    pub const ANGLES: usize = 52;
    pub const AXIS_MAP: usize = 64;
    pub const MIN1: usize = 76;
    pub const MAX1: usize = 80;
    pub const MEAN: usize = 84;
    pub const SPACE_GROUP: usize = 88;
    pub const EXT_HEADER_SIZE: usize = 92;
    pub const MAGIC: usize = 96;
    pub const BLANK: usize = 98;
    pub const NTST: usize = 100;
    pub const EXTRA: usize = 104;
    pub const NINT: usize = 128;
    pub const NREAL: usize = 130;
    pub const NRES: usize = 132;
    pub const NZFACT: usize = 134;
    pub const MIN2: usize = 136;
    pub const FILE_TYPE: usize = 160;
    pub const MIN5: usize = 172;
    pub const MAX5: usize = 176;
    pub const NUM_TIMES: usize = 180;
    pub const IMAGE_SEQUENCE: usize = 182;
    pub const TILT: usize = 184;
    pub const NUM_WAVES: usize = 196;
    pub const WAVE_IDS: usize = 198;
    pub const Z_ORIGIN: usize = 208;
    pub const X_ORIGIN: usize = 212;
    pub const Y_ORIGIN: usize = 216;
    pub const NUM_LABELS: usize = 220;
    pub const LABELS: usize = 224;
}

/// Numeric field runs as `(offset, width, count)`. Byte arrays are absent.
const NUMERIC_RUNS: &[(usize, usize, usize)] = &[
    (0, 4, 24),
    (96, 2, 2),
    (100, 4, 1),
    (128, 2, 4),
    (136, 4, 6),
    (160, 2, 6),
    (172, 4, 2),
    (180, 2, 2),
    (184, 4, 3),
    (196, 2, 6),
    (208, 4, 3),
    (220, 4, 1),
];

/// Byte order of a file relative to this machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ByteOrder {
    /// Same order as this machine.
    #[default]
    Native,
    /// Every multi-byte number must be reversed.
    Swapped,
}

impl ByteOrder {
    /// Returns true for [`ByteOrder::Swapped`].
    #[inline]
    #[must_use]
    pub fn is_swapped(self) -> bool {
        self == Self::Swapped
    }

    /// Brings freshly read 16-bit samples into native order.
    #[inline]
    pub fn fix_samples(self, samples: &mut [i16]) {
        if self.is_swapped() {
            for sample in samples {
                *sample = sample.swap_bytes();
            }
        }
    }

    /// Brings freshly read 4-byte words into native order.
    #[inline]
    pub fn fix_words(self, bytes: &mut [u8]) {
        if self.is_swapped() {
            for word in bytes.chunks_exact_mut(4) {
                word.reverse();
            }
        }
    }
}

/// Reverses every 2- and 4-byte numeric field of a raw header in place.
///
/// Byte arrays (`extra`, labels) are left untouched, so applying this twice
/// restores the original bytes.
pub fn swap_header_bytes(raw: &mut [u8; HEADER_SIZE]) {
    for &(start, width, count) in NUMERIC_RUNS {
        for field in 0..count {
            let offset = start + field * width;
            raw[offset..offset + width].reverse();
        }
    }
}

/// Decoded DV header.
#[derive(Debug, Clone, PartialEq)]
pub struct DvHeader {
    /// Byte order the file was written in.
    pub byte_order: ByteOrder,
    pub num_cols: i32,
    pub num_rows: i32,
    /// Planes in the file (`z × waves × times`).
    pub num_images: i32,
    /// Pixel mode.
    pub mode: i32,
    /// `nxst, nyst, nzst`.
    pub start: [i32; 3],
    /// `mx, my, mz`.
    pub sampling: [i32; 3],
    /// Physical voxel size `xlen, ylen, zlen`.
    pub pixel_size: [f32; 3],
    /// `alpha, beta, gamma`.
    pub angles: [f32; 3],
    /// `mapc, mapr, maps`.
    pub axis_map: [i32; 3],
    /// Mean intensity of the first wavelength.
    pub mean: f32,
    pub space_group: i32,
    /// Size of the extended header in bytes.
    pub ext_header_size: i32,
    /// Magic, `DV_MAGIC` after decoding.
    pub magic: i16,
    pub blank: i16,
    pub ntst: i32,
    pub extra: [u8; 24],
    /// Integers per extended header section.
    pub ints_per_section: i16,
    /// Floats per extended header section.
    pub floats_per_section: i16,
    pub nres: i16,
    pub nzfact: i16,
    /// `(min, max)` intensity per wavelength.
    pub wave_ranges: [[f32; 2]; MAX_WAVES],
    pub file_type: i16,
    pub lens: i16,
    pub n1: i16,
    pub n2: i16,
    pub v1: i16,
    pub v2: i16,
    pub num_times: i16,
    pub image_sequence: i16,
    pub tilt: [f32; 3],
    pub num_waves: i16,
    /// Emission wavelengths in nm.
    pub wave_ids: [i16; MAX_WAVES],
    /// Origin `[x, y, z]`.
    pub origin: [f32; 3],
    pub num_labels: i32,
    pub labels: [[u8; LABEL_LEN]; NUM_LABELS],
}

impl DvHeader {
    /// Creates a native-order header for a 16-bit stack with default metadata.
    #[must_use]
    pub fn new(cols: i32, rows: i32, num_z: i32, num_waves: i16, num_times: i16) -> Self {
        Self {
            byte_order: ByteOrder::Native,
            num_cols: cols,
            num_rows: rows,
            num_images: num_z * i32::from(num_waves.max(1)) * i32::from(num_times.max(1)),
            mode: MODE_I16,
            start: [0; 3],
            sampling: [cols, rows, num_z],
            pixel_size: [1.0; 3],
            angles: [90.0; 3],
            axis_map: [1, 2, 3],
            mean: 0.0,
            space_group: 0,
            ext_header_size: 0,
            magic: DV_MAGIC,
            blank: 0,
            ntst: 0,
            extra: [0; 24],
            ints_per_section: 0,
            floats_per_section: 0,
            nres: 0,
            nzfact: 0,
            wave_ranges: [[0.0; 2]; MAX_WAVES],
            file_type: 0,
            lens: 0,
            n1: 0,
            n2: 0,
            v1: 0,
            v2: 0,
            num_times,
            image_sequence: ImageSequence::Zwt as i16,
            tilt: [0.0; 3],
            num_waves,
            wave_ids: [0; MAX_WAVES],
            origin: [0.0; 3],
            num_labels: 0,
            labels: [[0; LABEL_LEN]; NUM_LABELS],
        }
    }

    /// Parses and validates a header.
    ///
    /// # Errors
    /// Returns [`Error::TruncatedHeader`], [`Error::BadMagic`],
    /// [`Error::UnsupportedMode`] or [`Error::InvalidDimensions`].
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let header = Self::decode(bytes)?;
        header.validate()?;
        Ok(header)
    }

    /// Decodes a header, resolving its byte order, without validating dimensions.
    ///
    /// # Errors
    /// Returns [`Error::TruncatedHeader`] or [`Error::BadMagic`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut raw: [u8; HEADER_SIZE] = bytes
            .get(..HEADER_SIZE)
            .and_then(|head| head.try_into().ok())
            .ok_or(Error::TruncatedHeader(bytes.len()))?;

        let native = NativeEndian::read_i16(&raw[offsets::MAGIC..]);
        if native == DV_MAGIC {
            return Ok(Self::decode_native(&raw, ByteOrder::Native));
        }

        swap_header_bytes(&mut raw);
        let swapped = NativeEndian::read_i16(&raw[offsets::MAGIC..]);
        if swapped == DV_MAGIC {
            return Ok(Self::decode_native(&raw, ByteOrder::Swapped));
        }

        Err(Error::BadMagic { native, swapped })
    }

    fn decode_native(raw: &[u8; HEADER_SIZE], byte_order: ByteOrder) -> Self {
        let i32_at = |offset: usize| NativeEndian::read_i32(&raw[offset..]);
        let i16_at = |offset: usize| NativeEndian::read_i16(&raw[offset..]);
        let f32_at = |offset: usize| NativeEndian::read_f32(&raw[offset..]);
        let i32x3 = |offset: usize| [i32_at(offset), i32_at(offset + 4), i32_at(offset + 8)];
        let f32x3 = |offset: usize| [f32_at(offset), f32_at(offset + 4), f32_at(offset + 8)];

        let mut wave_ranges = [[0.0; 2]; MAX_WAVES];
        wave_ranges[0] = [f32_at(offsets::MIN1), f32_at(offsets::MAX1)];
        for (i, range) in wave_ranges[1..4].iter_mut().enumerate() {
            let offset = offsets::MIN2 + i * 8;
            *range = [f32_at(offset), f32_at(offset + 4)];
        }
        wave_ranges[4] = [f32_at(offsets::MIN5), f32_at(offsets::MAX5)];

        let mut wave_ids = [0; MAX_WAVES];
        for (i, id) in wave_ids.iter_mut().enumerate() {
            *id = i16_at(offsets::WAVE_IDS + i * 2);
        }

        let mut extra = [0; 24];
        extra.copy_from_slice(&raw[offsets::EXTRA..offsets::EXTRA + 24]);
        let mut labels = [[0; LABEL_LEN]; NUM_LABELS];
        for (i, label) in labels.iter_mut().enumerate() {
            let offset = offsets::LABELS + i * LABEL_LEN;
            label.copy_from_slice(&raw[offset..offset + LABEL_LEN]);
        }

        let file_types: Vec<i16> = (0..6).map(|i| i16_at(offsets::FILE_TYPE + i * 2)).collect();

        Self {
            byte_order,
            num_cols: i32_at(offsets::NUM_COL),
            num_rows: i32_at(offsets::NUM_ROW),
            num_images: i32_at(offsets::NUM_IMAGES),
            mode: i32_at(offsets::MODE),
            start: i32x3(offsets::START),
            sampling: i32x3(offsets::SAMPLING),
            pixel_size: f32x3(offsets::CELL),
            angles: f32x3(offsets::ANGLES),
            axis_map: i32x3(offsets::AXIS_MAP),
            mean: f32_at(offsets::MEAN),
            space_group: i32_at(offsets::SPACE_GROUP),
            ext_header_size: i32_at(offsets::EXT_HEADER_SIZE),
            magic: i16_at(offsets::MAGIC),
            blank: i16_at(offsets::BLANK),
            ntst: i32_at(offsets::NTST),
            extra,
            ints_per_section: i16_at(offsets::NINT),
            floats_per_section: i16_at(offsets::NREAL),
            nres: i16_at(offsets::NRES),
            nzfact: i16_at(offsets::NZFACT),
            wave_ranges,
            file_type: file_types[0],
            lens: file_types[1],
            n1: file_types[2],
            n2: file_types[3],
            v1: file_types[4],
            v2: file_types[5],
            num_times: i16_at(offsets::NUM_TIMES),
            image_sequence: i16_at(offsets::IMAGE_SEQUENCE),
            tilt: f32x3(offsets::TILT),
            num_waves: i16_at(offsets::NUM_WAVES),
            wave_ids,
            origin: [
                f32_at(offsets::X_ORIGIN),
                f32_at(offsets::Y_ORIGIN),
                f32_at(offsets::Z_ORIGIN),
            ],
            num_labels: i32_at(offsets::NUM_LABELS),
            labels,
        }
    }

    /// Serializes the header in this machine's byte order.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut raw = [0u8; HEADER_SIZE];
        {
            let mut put_i32 = |offset: usize, v: i32| NativeEndian::write_i32(&mut raw[offset..], v);
            put_i32(offsets::NUM_COL, self.num_cols);
            put_i32(offsets::NUM_ROW, self.num_rows);
            put_i32(offsets::NUM_IMAGES, self.num_images);
            put_i32(offsets::MODE, self.mode);
            for i in 0..3 {
                put_i32(offsets::START + i * 4, self.start[i]);
                put_i32(offsets::SAMPLING + i * 4, self.sampling[i]);
                put_i32(offsets::AXIS_MAP + i * 4, self.axis_map[i]);
            }
            put_i32(offsets::SPACE_GROUP, self.space_group);
            put_i32(offsets::EXT_HEADER_SIZE, self.ext_header_size);
            put_i32(offsets::NTST, self.ntst);
            put_i32(offsets::NUM_LABELS, self.num_labels);
        }
        {
            let mut put_f32 = |offset: usize, v: f32| NativeEndian::write_f32(&mut raw[offset..], v);
            for i in 0..3 {
                put_f32(offsets::CELL + i * 4, self.pixel_size[i]);
                put_f32(offsets::ANGLES + i * 4, self.angles[i]);
                put_f32(offsets::TILT + i * 4, self.tilt[i]);
            }
            put_f32(offsets::MIN1, self.wave_ranges[0][0]);
            put_f32(offsets::MAX1, self.wave_ranges[0][1]);
            put_f32(offsets::MEAN, self.mean);
            for (i, range) in self.wave_ranges[1..4].iter().enumerate() {
                put_f32(offsets::MIN2 + i * 8, range[0]);
                put_f32(offsets::MIN2 + i * 8 + 4, range[1]);
            }
            put_f32(offsets::MIN5, self.wave_ranges[4][0]);
            put_f32(offsets::MAX5, self.wave_ranges[4][1]);
            put_f32(offsets::X_ORIGIN, self.origin[0]);
            put_f32(offsets::Y_ORIGIN, self.origin[1]);
            put_f32(offsets::Z_ORIGIN, self.origin[2]);
        }
        {
            let mut put_i16 = |offset: usize, v: i16| NativeEndian::write_i16(&mut raw[offset..], v);
            put_i16(offsets::MAGIC, self.magic);
            put_i16(offsets::BLANK, self.blank);
            put_i16(offsets::NINT, self.ints_per_section);
            put_i16(offsets::NREAL, self.floats_per_section);
            put_i16(offsets::NRES, self.nres);
            put_i16(offsets::NZFACT, self.nzfact);
            let file_types = [self.file_type, self.lens, self.n1, self.n2, self.v1, self.v2];
            for (i, v) in file_types.into_iter().enumerate() {
                put_i16(offsets::FILE_TYPE + i * 2, v);
            }
            put_i16(offsets::NUM_TIMES, self.num_times);
            put_i16(offsets::IMAGE_SEQUENCE, self.image_sequence);
            put_i16(offsets::NUM_WAVES, self.num_waves);
            for (i, &id) in self.wave_ids.iter().enumerate() {
                put_i16(offsets::WAVE_IDS + i * 2, id);
            }
        }
        raw[offsets::EXTRA..offsets::EXTRA + 24].copy_from_slice(&self.extra);
        for (i, label) in self.labels.iter().enumerate() {
            let offset = offsets::LABELS + i * LABEL_LEN;
            raw[offset..offset + LABEL_LEN].copy_from_slice(label);
        }
        raw
    }

    /// Serializes the header in the given byte order.
    #[must_use]
    pub fn to_bytes_in(&self, order: ByteOrder) -> [u8; HEADER_SIZE] {
        let mut raw = self.to_bytes();
        if order.is_swapped() {
            swap_header_bytes(&mut raw);
        }
        raw
    }

    /// Checks mode and dimensions.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedMode`] or [`Error::InvalidDimensions`].
    pub fn validate(&self) -> Result<()> {
        if self.mode != MODE_I16 {
            return Err(Error::UnsupportedMode(self.mode));
        }
        if self.num_cols <= 0 || self.num_rows <= 0 || self.num_images <= 0 {
            return Err(Error::InvalidDimensions(format!(
                "{} x {} x {} planes",
                self.num_cols, self.num_rows, self.num_images
            )));
        }
        if self.num_waves < 0 || self.num_waves as usize > MAX_WAVES {
            return Err(Error::InvalidDimensions(format!(
                "{} wavelengths (1 to {MAX_WAVES} supported)",
                self.num_waves
            )));
        }
        if self.num_times < 0 {
            return Err(Error::InvalidDimensions(format!(
                "{} timepoints",
                self.num_times
            )));
        }
        let per_z = self.num_waves() * self.num_times();
        if self.num_images as usize % per_z != 0 {
            return Err(Error::InvalidDimensions(format!(
                "{} planes cannot be split into {} wavelengths x {} timepoints",
                self.num_images,
                self.num_waves(),
                self.num_times()
            )));
        }
        if self.ext_header_size < 0 {
            return Err(Error::InvalidDimensions(format!(
                "negative extended header size {}",
                self.ext_header_size
            )));
        }
        ImageSequence::try_from(self.image_sequence)?;
        Ok(())
    }

    /// Wavelength count, treating 0 as 1.
    #[must_use]
    pub fn num_waves(&self) -> usize {
        (self.num_waves.max(1)) as usize
    }

    /// Timepoint count, treating 0 as 1.
    #[must_use]
    pub fn num_times(&self) -> usize {
        (self.num_times.max(1)) as usize
    }

    /// Z sections: `numImages / (numWaves × numTimes)`.
    #[must_use]
    pub fn num_z(&self) -> usize {
        self.num_images.max(0) as usize / (self.num_waves() * self.num_times())
    }

    /// Columns as `usize`.
    #[must_use]
    pub fn cols(&self) -> usize {
        self.num_cols.max(0) as usize
    }

    /// Rows as `usize`.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.num_rows.max(0) as usize
    }

    /// Emission wavelength ids of the wavelengths present.
    #[must_use]
    pub fn wave_ids(&self) -> Vec<i32> {
        self.wave_ids[..self.num_waves()]
            .iter()
            .map(|&id| i32::from(id))
            .collect()
    }

    /// `(min, max)` recorded for wavelength `wave`.
    #[must_use]
    pub fn wave_range(&self, wave: usize) -> Option<(f32, f32)> {
        if wave < self.num_waves() {
            let [min, max] = self.wave_ranges[wave];
            Some((min, max))
        } else {
            None
        }
    }

    /// Physical voxel size; non-positive or non-finite sizes read as 1.
    #[must_use]
    pub fn voxel_size(&self) -> [f64; 3] {
        self.pixel_size.map(|len| {
            let len = f64::from(len);
            if len.is_finite() && len > 0.0 {
                len
            } else {
                1.0
            }
        })
    }

    /// Plane interleaving. Falls back to ZWT for unknown codes.
    #[must_use]
    pub fn sequence(&self) -> ImageSequence {
        ImageSequence::try_from(self.image_sequence).unwrap_or(ImageSequence::Zwt)
    }

    /// Plane layout of the file.
    #[must_use]
    pub fn layout(&self) -> PlaneLayout {
        PlaneLayout {
            num_z: self.num_z(),
            num_waves: self.num_waves(),
            num_times: self.num_times(),
            sequence: self.sequence(),
        }
    }

    /// Dimensions of one timepoint's stack.
    #[must_use]
    pub fn stack_dims(&self) -> StackDims {
        StackDims::new(self.cols(), self.rows(), self.num_z(), self.num_waves())
    }

    /// Bytes per image plane.
    #[must_use]
    pub fn plane_bytes(&self) -> usize {
        self.cols() * self.rows() * BYTES_PER_SAMPLE
    }

    /// Byte offset of the first pixel plane.
    #[must_use]
    pub fn data_offset(&self) -> usize {
        HEADER_SIZE + self.ext_header_size.max(0) as usize
    }

    /// Byte offset of a plane.
    #[must_use]
    pub fn plane_offset(&self, plane: usize) -> usize {
        self.data_offset() + plane * self.plane_bytes()
    }

    /// Total file size implied by the header.
    #[must_use]
    pub fn expected_file_size(&self) -> usize {
        self.plane_offset(self.layout().num_planes())
    }

    /// Label `index` as text, trailing NULs and spaces trimmed.
    #[must_use]
    pub fn label(&self, index: usize) -> Option<String> {
        let label = self.labels.get(index)?;
        let text = String::from_utf8_lossy(label);
        Some(text.trim_end_matches(['\0', ' ']).to_string())
    }

    /// Stores `text` as label `index`, truncated to 80 bytes.
    pub fn set_label(&mut self, index: usize, text: &str) {
        if let Some(label) = self.labels.get_mut(index) {
            label.fill(0);
            let bytes = text.as_bytes();
            let len = bytes.len().min(LABEL_LEN);
            label[..len].copy_from_slice(&bytes[..len]);
            let count = i32::try_from(index + 1).unwrap_or(i32::MAX);
            self.num_labels = self.num_labels.max(count);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;

    fn sample_header() -> DvHeader {
        let mut header = DvHeader::new(64, 32, 5, 2, 3);
        header.pixel_size = [0.1, 0.1, 0.2];
        header.wave_ids[0] = 528;
        header.wave_ids[1] = 617;
        header.wave_ranges[1] = [10.0, 900.0];
        header.ext_header_size = 128;
        header.image_sequence = ImageSequence::Wzt as i16;
        header.set_label(0, "synthetic stack");
        header
    }

    #[test]
    fn test_native_round_trip() {
        let header = sample_header();
        let parsed = DvHeader::parse(&header.to_bytes()).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.byte_order, ByteOrder::Native);
    }

    #[test]
    fn test_swapped_detected() {
        let header = sample_header();
        let parsed = DvHeader::parse(&header.to_bytes_in(ByteOrder::Swapped)).unwrap();
        assert_eq!(parsed.byte_order, ByteOrder::Swapped);
        assert_eq!(parsed.num_cols, 64);
        assert_eq!(parsed.num_images, 30);
        assert_eq!(parsed.pixel_size, [0.1, 0.1, 0.2]);
        assert_eq!(parsed.wave_ids(), vec![528, 617]);
        assert_eq!(parsed.label(0).unwrap(), "synthetic stack");
    }

    #[test]
    fn test_swap_twice_is_identity() {
        let original = sample_header().to_bytes();
        let mut raw = original;
        swap_header_bytes(&mut raw);
        assert_ne!(raw, original);
        swap_header_bytes(&mut raw);
        assert_eq!(raw, original);
    }

    #[test]
    fn test_swap_leaves_labels_alone() {
        let original = sample_header().to_bytes();
        let mut raw = original;
        swap_header_bytes(&mut raw);
        assert_eq!(raw[224..], original[224..]);
        assert_eq!(raw[104..128], original[104..128]);
    }

    #[test]
    fn test_bad_magic() {
        let mut header = sample_header();
        header.magic = 1234;
        let result = DvHeader::parse(&header.to_bytes());
        assert!(matches!(result, Err(Error::BadMagic { native: 1234, .. })));
    }

    #[test]
    fn test_truncated() {
        assert!(matches!(
            DvHeader::parse(&[0u8; 100]),
            Err(Error::TruncatedHeader(100))
        ));
    }

    #[test]
    fn test_dimensions() {
        let header = sample_header();
        assert_eq!(header.num_z(), 5);
        assert_eq!(header.num_waves(), 2);
        assert_eq!(header.num_times(), 3);
        assert_eq!(header.plane_bytes(), 64 * 32 * 2);
        assert_eq!(header.data_offset(), 1024 + 128);
        assert_eq!(header.expected_file_size(), 1024 + 128 + 30 * 64 * 32 * 2);
        assert_eq!(header.stack_dims(), StackDims::new(64, 32, 5, 2));
        assert_eq!(header.wave_range(1), Some((10.0, 900.0)));
        assert_eq!(header.wave_range(2), None);
    }

    #[test]
    fn test_zero_waves_and_times_read_as_one() {
        let mut header = DvHeader::new(4, 4, 4, 1, 1);
        header.num_waves = 0;
        header.num_times = 0;
        let parsed = DvHeader::parse(&header.to_bytes()).unwrap();
        assert_eq!(parsed.num_waves(), 1);
        assert_eq!(parsed.num_times(), 1);
        assert_eq!(parsed.num_z(), 4);
    }

    #[test]
    fn test_rejects_inconsistent_planes() {
        let mut header = DvHeader::new(4, 4, 4, 2, 1);
        header.num_images = 7;
        assert!(matches!(
            DvHeader::parse(&header.to_bytes()),
            Err(Error::InvalidDimensions(_))
        ));
    }

    #[test]
    fn test_rejects_other_modes() {
        let mut header = DvHeader::new(4, 4, 4, 1, 1);
        header.mode = 2;
        assert!(matches!(
            DvHeader::parse(&header.to_bytes()),
            Err(Error::UnsupportedMode(2))
        ));
    }

    #[test]
    fn test_voxel_size_defaults() {
        let mut header = DvHeader::new(4, 4, 4, 1, 1);
        header.pixel_size = [0.0, -1.0, 0.3];
        let size = header.voxel_size();
        assert_eq!(size[0], 1.0);
        assert_eq!(size[1], 1.0);
        assert!((size[2] - 0.3).abs() < 1e-6);
    }
}
