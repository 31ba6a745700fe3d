//! Memory-mapped DV readers.

use crate::{Error, Result};
use byteorder::{ByteOrder as _, NativeEndian};
use log::debug;
use memmap2::Mmap;
use spottrack_core::{alloc_samples, StackDims, VolumeStack};
use spottrack_dv::{DvHeader, ExtendedHeader, BYTES_PER_SAMPLE};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Read-only mapping of a whole file.
///
/// Pages are faulted in as planes are decoded, so only the timepoints being
/// extracted occupy resident memory.
#[derive(Clone)]
pub struct MappedFileReader {
    mmap: Arc<Mmap>,
    path: PathBuf,
}

impl MappedFileReader {
    /// Maps `path` read-only.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if the file cannot be opened and
    /// [`Error::MmapError`] if it cannot be mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        // SAFETY: mapped read-only; DV files are not rewritten while being tracked.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| Error::MmapError(format!("{}: {e}", path.display())))?;
        Ok(Self {
            mmap: Arc::new(mmap),
            path: path.to_path_buf(),
        })
    }

    /// Mapped contents.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }

    /// Mapped length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Whether the file has no bytes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Path the file was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A DV file reader with memory-mapped I/O.
///
/// The header is decoded once at open; timepoints are decoded on demand into
/// freshly allocated [`VolumeStack`]s.
#[derive(Clone)]
pub struct DvFileReader {
    reader: MappedFileReader,
    header: DvHeader,
    extended: ExtendedHeader,
}

impl DvFileReader {
    /// Opens a DV file and decodes its headers.
    ///
    /// # Errors
    /// Returns an error if the file cannot be mapped or its header is invalid.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = MappedFileReader::open(path)?;
        let header = DvHeader::parse(reader.as_bytes())?;
        let extended = ExtendedHeader::parse(&header, reader.as_bytes());
        debug!(
            "{}: {}x{}x{} voxels, {} waves, {} timepoints, {:?} order",
            reader.path().display(),
            header.cols(),
            header.rows(),
            header.num_z(),
            header.num_waves(),
            header.num_times(),
            header.byte_order
        );
        Ok(Self {
            reader,
            header,
            extended,
        })
    }

    /// Decoded fixed header.
    #[must_use]
    pub fn header(&self) -> &DvHeader {
        &self.header
    }

    /// Decoded extended header.
    #[must_use]
    pub fn extended(&self) -> &ExtendedHeader {
        &self.extended
    }

    /// Path the file was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.reader.path()
    }

    /// Size of the file on disk.
    #[must_use]
    pub fn file_size(&self) -> usize {
        self.reader.len()
    }

    /// Number of timepoints.
    #[must_use]
    pub fn num_times(&self) -> usize {
        self.header.num_times()
    }

    /// Dimensions of one timepoint.
    #[must_use]
    pub fn stack_dims(&self) -> StackDims {
        self.header.stack_dims()
    }

    /// Bytes of pixel data per timepoint.
    #[must_use]
    pub fn stack_bytes(&self) -> usize {
        self.stack_dims().len() * BYTES_PER_SAMPLE
    }

    /// Elapsed seconds at the first plane of timepoint `t`, when recorded.
    #[must_use]
    pub fn elapsed_seconds(&self, t: usize) -> Option<f64> {
        if t >= self.num_times() {
            return None;
        }
        let plane = self.header.layout().plane_index(0, 0, t);
        self.extended.elapsed_seconds(plane)
    }

    /// Loads every wavelength of timepoint `t`.
    ///
    /// Samples are swapped into native order and gathered into `(wave, z, y, x)`
    /// order whatever the file's plane interleaving.
    ///
    /// # Errors
    /// Returns [`Error::ShortRead`] if the file ends before the timepoint's last
    /// plane, or a core error for a bad timepoint or a failed allocation.
    pub fn load_stack(&self, t: usize) -> Result<VolumeStack> {
        let num_times = self.num_times();
        if t >= num_times {
            return Err(spottrack_core::Error::TimepointOutOfRange {
                timepoint: t,
                num_times,
            }
            .into());
        }

        let header = &self.header;
        let layout = header.layout();
        let plane_bytes = header.plane_bytes();
        let data = self.reader.as_bytes();
        let expected = layout
            .timepoint_planes(t)
            .map(|(_, _, plane)| header.plane_offset(plane) + plane_bytes)
            .max()
            .unwrap_or(0);
        if expected > data.len() {
            return Err(Error::ShortRead {
                timepoint: t,
                expected,
                available: data.len(),
            });
        }

        let dims = self.stack_dims();
        let plane_len = dims.z_stride();
        let mut pixels = alloc_samples(dims.len())?;
        for (wave, z, plane) in layout.timepoint_planes(t) {
            let start = header.plane_offset(plane);
            let dst = dims.offset(0, 0, z, wave);
            NativeEndian::read_i16_into(
                &data[start..start + plane_bytes],
                &mut pixels[dst..dst + plane_len],
            );
        }
        header.byte_order.fix_samples(&mut pixels);

        Ok(VolumeStack::new(dims, t, pixels)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spottrack_dv::{encode_file, ByteOrder, ImageSequence};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_file(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    fn ramp_stacks(header: &DvHeader) -> Vec<Vec<i16>> {
        let len = header.stack_dims().len();
        (0..header.num_times())
            .map(|t| (0..len).map(|i| (t * 1000 + i) as i16).collect())
            .collect()
    }

    #[test]
    fn test_mapped_reader() {
        let file = write_file(&[1, 2, 3]);
        let reader = MappedFileReader::open(file.path()).unwrap();
        assert_eq!(reader.len(), 3);
        assert_eq!(reader.as_bytes(), &[1, 2, 3]);
    }

    #[test]
    fn test_load_every_order() {
        for order in [ByteOrder::Native, ByteOrder::Swapped] {
            for sequence in [ImageSequence::Ztw, ImageSequence::Wzt, ImageSequence::Zwt] {
                let mut header = DvHeader::new(3, 2, 2, 2, 3);
                header.image_sequence = sequence as i16;
                let stacks = ramp_stacks(&header);
                let file = write_file(&encode_file(&header, None, &stacks, order).unwrap());

                let reader = DvFileReader::open(file.path()).unwrap();
                assert_eq!(reader.header().byte_order, order);
                for (t, expected) in stacks.iter().enumerate() {
                    let stack = reader.load_stack(t).unwrap();
                    assert_eq!(stack.pixels(), expected.as_slice(), "{order:?} {sequence:?} t={t}");
                    assert_eq!(stack.timepoint(), t);
                }
            }
        }
    }

    #[test]
    fn test_short_read() {
        let header = DvHeader::new(4, 4, 2, 1, 2);
        let bytes = encode_file(&header, None, &ramp_stacks(&header), ByteOrder::Native).unwrap();
        let file = write_file(&bytes[..bytes.len() - 10]);
        let reader = DvFileReader::open(file.path()).unwrap();
        assert!(reader.load_stack(0).is_ok());
        assert!(matches!(
            reader.load_stack(1),
            Err(Error::ShortRead { timepoint: 1, .. })
        ));
    }

    #[test]
    fn test_timepoint_out_of_range() {
        let header = DvHeader::new(2, 2, 1, 1, 1);
        let bytes = encode_file(&header, None, &ramp_stacks(&header), ByteOrder::Native).unwrap();
        let file = write_file(&bytes);
        let reader = DvFileReader::open(file.path()).unwrap();
        assert!(matches!(
            reader.load_stack(1),
            Err(Error::Core(spottrack_core::Error::TimepointOutOfRange { .. }))
        ));
    }

    #[test]
    fn test_bad_magic_is_format_error() {
        let file = write_file(&[0u8; 2048]);
        assert!(matches!(
            DvFileReader::open(file.path()),
            Err(Error::Format(spottrack_dv::Error::BadMagic { .. }))
        ));
    }
}
