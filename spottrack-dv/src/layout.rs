//! Plane ordering inside a DV file.
//!
//! A DV file stores `numImages` planes of `cols × rows` samples. The header's
//! image sequence decides how `(z, wave, time)` map onto the plane index.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Plane interleaving, from the header's `imageSequence` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
pub enum ImageSequence {
    /// Z fastest, then time, then wavelength.
    Ztw = 0,
    /// Wavelength fastest, then z, then time.
    Wzt = 1,
    /// Z fastest, then wavelength, then time.
    Zwt = 2,
}

impl TryFrom<i16> for ImageSequence {
    type Error = Error;

    fn try_from(raw: i16) -> Result<Self> {
        match raw {
            0 => Ok(Self::Ztw),
            1 => Ok(Self::Wzt),
            2 => Ok(Self::Zwt),
            _ => Err(Error::InvalidDimensions(format!(
                "unknown image sequence {raw}"
            ))),
        }
    }
}

/// Maps `(z, wave, time)` to plane indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    /// Z sections per wavelength and timepoint.
    pub num_z: usize,
    /// Wavelengths.
    pub num_waves: usize,
    /// Timepoints.
    pub num_times: usize,
    /// Interleaving order.
    pub sequence: ImageSequence,
}

impl PlaneLayout {
    /// Plane index of section `z` of wavelength `wave` at timepoint `time`.
    #[inline]
    #[must_use]
    pub fn plane_index(&self, z: usize, wave: usize, time: usize) -> usize {
        let (nz, nw, nt) = (self.num_z, self.num_waves, self.num_times);
        match self.sequence {
            ImageSequence::Ztw => wave * nt * nz + time * nz + z,
            ImageSequence::Wzt => time * nz * nw + z * nw + wave,
            ImageSequence::Zwt => time * nw * nz + wave * nz + z,
        }
    }

    /// Total planes in the file.
    #[must_use]
    pub fn num_planes(&self) -> usize {
        self.num_z * self.num_waves * self.num_times
    }

    /// Planes of one timepoint as `(wave, z, plane_index)`, in stack order.
    pub fn timepoint_planes(&self, time: usize) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        (0..self.num_waves).flat_map(move |wave| {
            (0..self.num_z).map(move |z| (wave, z, self.plane_index(z, wave, time)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn layout(sequence: ImageSequence) -> PlaneLayout {
        PlaneLayout {
            num_z: 3,
            num_waves: 2,
            num_times: 4,
            sequence,
        }
    }

    #[test]
    fn test_plane_indices_are_a_permutation() {
        for sequence in [ImageSequence::Ztw, ImageSequence::Wzt, ImageSequence::Zwt] {
            let l = layout(sequence);
            let mut seen = HashSet::new();
            for t in 0..4 {
                for (_, _, plane) in l.timepoint_planes(t) {
                    assert!(plane < l.num_planes());
                    assert!(seen.insert(plane), "{sequence:?} repeats plane {plane}");
                }
            }
            assert_eq!(seen.len(), l.num_planes());
        }
    }

    #[test]
    fn test_known_offsets() {
        assert_eq!(layout(ImageSequence::Ztw).plane_index(1, 1, 2), 4 * 3 + 2 * 3 + 1);
        assert_eq!(layout(ImageSequence::Wzt).plane_index(1, 1, 2), 2 * 6 + 2 + 1);
        assert_eq!(layout(ImageSequence::Zwt).plane_index(1, 1, 2), 2 * 6 + 3 + 1);
    }

    #[test]
    fn test_unknown_sequence() {
        assert!(ImageSequence::try_from(3).is_err());
        assert_eq!(ImageSequence::try_from(2).unwrap(), ImageSequence::Zwt);
    }
}
