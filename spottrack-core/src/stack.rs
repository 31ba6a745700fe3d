//! Per-timepoint pixel stack.
//!
//! A [`VolumeStack`] holds every wavelength of one timepoint as a flat buffer of
//! 16-bit samples in `(wave, z, y, x)` order, x fastest.

use crate::stats::WaveStats;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Dimensions of one timepoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDims {
    /// Columns (x extent).
    pub cols: usize,
    /// Rows (y extent).
    pub rows: usize,
    /// Z sections.
    pub num_z: usize,
    /// Wavelengths.
    pub num_waves: usize,
}

impl StackDims {
    /// Creates stack dimensions.
    #[must_use]
    pub fn new(cols: usize, rows: usize, num_z: usize, num_waves: usize) -> Self {
        Self {
            cols,
            rows,
            num_z,
            num_waves,
        }
    }

    /// Distance between vertically adjacent samples.
    #[inline]
    #[must_use]
    pub fn row_stride(&self) -> usize {
        self.cols
    }

    /// Samples per plane.
    #[inline]
    #[must_use]
    pub fn z_stride(&self) -> usize {
        self.cols * self.rows
    }

    /// Samples per wavelength.
    #[inline]
    #[must_use]
    pub fn wave_stride(&self) -> usize {
        self.z_stride() * self.num_z
    }

    /// Total samples in the stack.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.wave_stride() * self.num_waves
    }

    /// Returns true when the stack holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Linear offset of `(x, y, z)` in wavelength `wave`.
    #[inline]
    #[must_use]
    pub fn offset(&self, x: usize, y: usize, z: usize, wave: usize) -> usize {
        wave * self.wave_stride() + z * self.z_stride() + y * self.row_stride() + x
    }

    /// Recovers `[x, y, z]` from a linear offset known to lie in wavelength `wave`.
    #[inline]
    #[must_use]
    pub fn coords(&self, offset: usize, wave: usize) -> [usize; 3] {
        let mut linear = offset - wave * self.wave_stride();
        let z = linear / self.z_stride();
        linear -= z * self.z_stride();
        let y = linear / self.row_stride();
        let x = linear - y * self.row_stride();
        [x, y, z]
    }
}

/// Inclusive box limiting the voxels a scan may visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipBox {
    /// Lowest `[x, y, z]` (inclusive).
    pub min: [usize; 3],
    /// Highest `[x, y, z]` (inclusive).
    pub max: [usize; 3],
}

impl ClipBox {
    /// Creates a clip box from inclusive corners.
    #[must_use]
    pub fn new(min: [usize; 3], max: [usize; 3]) -> Self {
        Self { min, max }
    }

    /// The box covering a whole stack. Only meaningful for non-empty dims.
    #[must_use]
    pub fn full(dims: &StackDims) -> Self {
        Self {
            min: [0, 0, 0],
            max: [
                dims.cols.saturating_sub(1),
                dims.rows.saturating_sub(1),
                dims.num_z.saturating_sub(1),
            ],
        }
    }

    /// Clamps the box to a stack.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the box is inverted or lies outside the stack.
    pub fn clamp_to(&self, dims: &StackDims) -> Result<Self> {
        let full = Self::full(dims);
        let mut clamped = *self;
        for axis in 0..3 {
            if self.min[axis] > self.max[axis] {
                return Err(Error::config(format!(
                    "clip box is inverted on axis {axis}: {} > {}",
                    self.min[axis], self.max[axis]
                )));
            }
            if self.min[axis] > full.max[axis] {
                return Err(Error::config(format!(
                    "clip box starts outside the stack on axis {axis}"
                )));
            }
            clamped.max[axis] = clamped.max[axis].min(full.max[axis]);
        }
        Ok(clamped)
    }

    /// Returns true when `[x, y, z]` lies inside the box.
    #[inline]
    #[must_use]
    pub fn contains(&self, x: usize, y: usize, z: usize) -> bool {
        (self.min[0]..=self.max[0]).contains(&x)
            && (self.min[1]..=self.max[1]).contains(&y)
            && (self.min[2]..=self.max[2]).contains(&z)
    }
}

/// Allocates a zeroed sample buffer, surfacing failure instead of aborting.
///
/// # Errors
/// Returns [`Error::Allocation`] if the buffer cannot be reserved.
pub fn alloc_samples(len: usize) -> Result<Vec<i16>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| Error::Allocation {
            what: "pixel buffer",
            elements: len,
        })?;
    buffer.resize(len, 0);
    Ok(buffer)
}

/// Decoded pixels of every wavelength at one timepoint.
#[derive(Debug, Clone)]
pub struct VolumeStack {
    dims: StackDims,
    timepoint: usize,
    pixels: Vec<i16>,
    clip: ClipBox,
    stats: Vec<OnceLock<WaveStats>>,
}

impl VolumeStack {
    /// Wraps an already decoded buffer.
    ///
    /// # Errors
    /// Returns [`Error::Format`] if the buffer length does not match `dims`.
    pub fn new(dims: StackDims, timepoint: usize, pixels: Vec<i16>) -> Result<Self> {
        if pixels.len() != dims.len() {
            return Err(Error::Format(format!(
                "stack buffer holds {} samples, dimensions need {}",
                pixels.len(),
                dims.len()
            )));
        }
        Ok(Self {
            dims,
            timepoint,
            pixels,
            clip: ClipBox::full(&dims),
            stats: (0..dims.num_waves).map(|_| OnceLock::new()).collect(),
        })
    }

    /// Allocates an all-zero stack.
    ///
    /// # Errors
    /// Returns [`Error::Allocation`] if the buffer cannot be allocated.
    pub fn zeroed(dims: StackDims, timepoint: usize) -> Result<Self> {
        let pixels = alloc_samples(dims.len())?;
        Self::new(dims, timepoint, pixels)
    }

    /// Restricts scans on this stack to `clip`, clamped to the stack bounds.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the box does not intersect the stack.
    pub fn set_clip(&mut self, clip: ClipBox) -> Result<()> {
        self.clip = clip.clamp_to(&self.dims)?;
        Ok(())
    }

    /// Stack dimensions.
    #[must_use]
    pub fn dims(&self) -> &StackDims {
        &self.dims
    }

    /// Timepoint this stack was loaded from.
    #[must_use]
    pub fn timepoint(&self) -> usize {
        self.timepoint
    }

    /// Active clip box.
    #[must_use]
    pub fn clip(&self) -> &ClipBox {
        &self.clip
    }

    /// All samples.
    #[must_use]
    pub fn pixels(&self) -> &[i16] {
        &self.pixels
    }

    /// All samples, mutable. Cached statistics are dropped and recomputed on
    /// the next request.
    pub fn pixels_mut(&mut self) -> &mut [i16] {
        for cached in &mut self.stats {
            cached.take();
        }
        &mut self.pixels
    }

    /// Samples of one wavelength.
    ///
    /// # Errors
    /// Returns [`Error::WavelengthOutOfRange`] for an unknown wavelength.
    pub fn wave(&self, wave: usize) -> Result<&[i16]> {
        self.check_wave(wave)?;
        let stride = self.dims.wave_stride();
        Ok(&self.pixels[wave * stride..(wave + 1) * stride])
    }

    /// Sample at `(x, y, z)` of `wave`. Panics if out of bounds.
    #[inline]
    #[must_use]
    pub fn get(&self, x: usize, y: usize, z: usize, wave: usize) -> i16 {
        self.pixels[self.dims.offset(x, y, z, wave)]
    }

    /// Writes the sample at `(x, y, z)` of `wave`. Panics if out of bounds.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize, wave: usize, value: i16) {
        let offset = self.dims.offset(x, y, z, wave);
        self.pixels[offset] = value;
    }

    /// Statistics of one wavelength, computed on first request and cached.
    ///
    /// # Errors
    /// Returns [`Error::WavelengthOutOfRange`] or [`Error::EmptyStack`].
    pub fn stats_for(&self, wave: usize) -> Result<WaveStats> {
        self.check_wave(wave)?;
        if let Some(stats) = self.stats[wave].get() {
            return Ok(*stats);
        }
        let stats = WaveStats::from_samples(self.wave(wave)?).ok_or(Error::EmptyStack)?;
        Ok(*self.stats[wave].get_or_init(|| stats))
    }

    /// Statistics of every wavelength, in wavelength order.
    ///
    /// # Errors
    /// Returns [`Error::EmptyStack`] for a stack without samples.
    pub fn all_stats(&self) -> Result<Vec<WaveStats>> {
        (0..self.dims.num_waves)
            .map(|wave| self.stats_for(wave))
            .collect()
    }

    fn check_wave(&self, wave: usize) -> Result<()> {
        if wave < self.dims.num_waves {
            Ok(())
        } else {
            Err(Error::WavelengthOutOfRange {
                wave,
                num_waves: self.dims.num_waves,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strides() {
        let dims = StackDims::new(4, 3, 2, 2);
        assert_eq!(dims.row_stride(), 4);
        assert_eq!(dims.z_stride(), 12);
        assert_eq!(dims.wave_stride(), 24);
        assert_eq!(dims.len(), 48);
    }

    #[test]
    fn test_offset_coords_inverse() {
        let dims = StackDims::new(5, 4, 3, 2);
        for wave in 0..2 {
            for z in 0..3 {
                for y in 0..4 {
                    for x in 0..5 {
                        let offset = dims.offset(x, y, z, wave);
                        assert_eq!(dims.coords(offset, wave), [x, y, z]);
                    }
                }
            }
        }
    }

    #[test]
    fn test_new_rejects_wrong_length() {
        let dims = StackDims::new(2, 2, 1, 1);
        assert!(VolumeStack::new(dims, 0, vec![0; 3]).is_err());
    }

    #[test]
    fn test_stats_idempotent() {
        let dims = StackDims::new(3, 3, 1, 1);
        let pixels: Vec<i16> = (0..9).collect();
        let stack = VolumeStack::new(dims, 0, pixels).unwrap();
        let first = stack.stats_for(0).unwrap();
        let second = stack.stats_for(0).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.min, 0);
        assert_eq!(first.max, 8);
    }

    #[test]
    fn test_stats_follow_mutation() {
        let dims = StackDims::new(3, 3, 1, 1);
        let mut stack = VolumeStack::new(dims, 0, vec![1; 9]).unwrap();
        let before = stack.stats_for(0).unwrap();
        assert_eq!(before.max, 1);
        stack.pixels_mut()[4] = 500;
        let after = stack.stats_for(0).unwrap();
        assert_eq!(after.max, 500);
        assert!(after.mean > before.mean);
    }

    #[test]
    fn test_wave_out_of_range() {
        let stack = VolumeStack::zeroed(StackDims::new(2, 2, 1, 1), 0).unwrap();
        assert!(matches!(
            stack.stats_for(1),
            Err(Error::WavelengthOutOfRange { wave: 1, .. })
        ));
    }

    #[test]
    fn test_per_wave_slices() {
        let dims = StackDims::new(2, 1, 1, 2);
        let stack = VolumeStack::new(dims, 0, vec![1, 2, 30, 40]).unwrap();
        assert_eq!(stack.wave(1).unwrap(), &[30, 40]);
        assert_eq!(stack.get(1, 0, 0, 1), 40);
    }

    #[test]
    fn test_clip_clamped() {
        let dims = StackDims::new(10, 10, 4, 1);
        let clip = ClipBox::new([2, 2, 0], [50, 50, 50]).clamp_to(&dims).unwrap();
        assert_eq!(clip.max, [9, 9, 3]);
        assert!(clip.contains(2, 9, 3));
        assert!(!clip.contains(1, 5, 0));
    }

    #[test]
    fn test_clip_inverted_rejected() {
        let dims = StackDims::new(10, 10, 4, 1);
        assert!(ClipBox::new([5, 0, 0], [4, 9, 3]).clamp_to(&dims).is_err());
        assert!(ClipBox::new([0, 0, 7], [9, 9, 9]).clamp_to(&dims).is_err());
    }
}
