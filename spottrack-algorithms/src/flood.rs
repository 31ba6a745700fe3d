//! 6-connected flood fill ("spot eating").
//!
//! Consumes one connected component of above-threshold voxels starting at a
//! seed. Visited voxels are overwritten with the threshold marker so neither
//! the fill nor the outer scan sees them again. The worklist lives on the heap,
//! so component size is bounded by memory rather than by the call stack.

use spottrack_core::{ClipBox, Error, Result, SpotAccumulator, StackDims, Threshold};

/// Entries reserved each time the work stack grows.
pub const WORK_CHUNK: usize = 8189;

/// Heap worklist of linear sample offsets.
#[derive(Debug, Default)]
pub struct WorkStack {
    offsets: Vec<usize>,
    peak: usize,
}

impl WorkStack {
    /// Creates an empty stack with one chunk reserved.
    ///
    /// # Errors
    /// Returns [`Error::Allocation`] if the first chunk cannot be reserved.
    pub fn new() -> Result<Self> {
        let mut stack = Self::default();
        stack.grow()?;
        Ok(stack)
    }

    fn grow(&mut self) -> Result<()> {
        self.offsets
            .try_reserve_exact(WORK_CHUNK)
            .map_err(|_| Error::Allocation {
                what: "flood fill work stack",
                elements: self.offsets.len() + WORK_CHUNK,
            })
    }

    /// Pushes an offset, growing by one chunk when full.
    ///
    /// # Errors
    /// Returns [`Error::Allocation`] if the stack cannot grow.
    #[inline]
    pub fn push(&mut self, offset: usize) -> Result<()> {
        if self.offsets.len() == self.offsets.capacity() {
            self.grow()?;
        }
        self.offsets.push(offset);
        self.peak = self.peak.max(self.offsets.len());
        Ok(())
    }

    /// Pops the most recent offset.
    #[inline]
    pub fn pop(&mut self) -> Option<usize> {
        self.offsets.pop()
    }

    /// Pending offsets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Returns true when nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Largest depth reached since creation.
    #[must_use]
    pub fn peak(&self) -> usize {
        self.peak
    }

    /// Drops pending offsets, keeping the allocation.
    pub fn clear(&mut self) {
        self.offsets.clear();
    }
}

/// Flood fill over the detection wavelength of one stack.
#[derive(Debug, Clone, Copy)]
pub struct FloodFill {
    dims: StackDims,
    clip: ClipBox,
    wave: usize,
    threshold: Threshold,
}

impl FloodFill {
    /// Creates a fill for wavelength `wave`, restricted to `clip`.
    ///
    /// The clip box is clamped to `dims`, so neighbor offsets always stay
    /// inside the stack buffer.
    ///
    /// # Errors
    /// Returns [`Error::WavelengthOutOfRange`] if `wave` is not in `dims`, or a
    /// configuration error if `clip` is inverted or starts outside the stack.
    pub fn new(dims: StackDims, clip: ClipBox, wave: usize, threshold: Threshold) -> Result<Self> {
        if wave >= dims.num_waves {
            return Err(Error::WavelengthOutOfRange {
                wave,
                num_waves: dims.num_waves,
            });
        }
        Ok(Self {
            dims,
            clip: clip.clamp_to(&dims)?,
            wave,
            threshold,
        })
    }

    /// Consumes the component containing `seed` into `spot`.
    ///
    /// `seed` is an offset into the whole stack buffer inside the detection
    /// wavelength. Nothing happens if the seed does not exceed the threshold.
    /// Every visited voxel is added to `spot` exactly once, with its samples in
    /// every wavelength, and its detection sample is set to the threshold marker.
    ///
    /// # Errors
    /// Returns [`Error::Allocation`] if the work stack cannot grow. The stack and
    /// the accumulator are left partially updated and must not be used further.
    pub fn eat(
        &self,
        pixels: &mut [i16],
        seed: usize,
        spot: &mut SpotAccumulator,
        work: &mut WorkStack,
    ) -> Result<()> {
        work.clear();
        if !self.take(pixels, seed, spot) {
            return Ok(());
        }
        work.push(seed)?;

        let dims = self.dims;
        let (row, plane) = (dims.row_stride(), dims.z_stride());
        while let Some(offset) = work.pop() {
            let [x, y, z] = dims.coords(offset, self.wave);
            let clip = &self.clip;
            if x > clip.min[0] {
                self.visit(pixels, offset - 1, spot, work)?;
            }
            if x < clip.max[0] {
                self.visit(pixels, offset + 1, spot, work)?;
            }
            if y > clip.min[1] {
                self.visit(pixels, offset - row, spot, work)?;
            }
            if y < clip.max[1] {
                self.visit(pixels, offset + row, spot, work)?;
            }
            if z > clip.min[2] {
                self.visit(pixels, offset - plane, spot, work)?;
            }
            if z < clip.max[2] {
                self.visit(pixels, offset + plane, spot, work)?;
            }
        }
        Ok(())
    }

    #[inline]
    fn visit(
        &self,
        pixels: &mut [i16],
        offset: usize,
        spot: &mut SpotAccumulator,
        work: &mut WorkStack,
    ) -> Result<()> {
        if self.take(pixels, offset, spot) {
            work.push(offset)?;
        }
        Ok(())
    }

    /// Adds the voxel to `spot` and marks it if it exceeds the threshold.
    #[inline]
    fn take(&self, pixels: &mut [i16], offset: usize, spot: &mut SpotAccumulator) -> bool {
        if !self.threshold.exceeds(pixels[offset]) {
            return false;
        }
        let pos = self.dims.coords(offset, self.wave);
        let base = offset - self.wave * self.dims.wave_stride();
        let stride = self.dims.wave_stride();
        spot.add_voxel(pos, |w| pixels[base + w * stride]);
        pixels[offset] = self.threshold.marker;
        true
    }
}
