//! The pre-sized, memory-mapped output file.
//!
//! The file is created at its full declared size up front and mapped once, so
//! the capture path writes samples straight into the page cache with no
//! per-batch syscalls. On close the mapping is flushed and the file is cut
//! back to exactly the number of bytes that were delivered.

use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
};

use memmap2::{MmapMut, MmapOptions};
use tracing::{debug, warn};

use crate::{
    complex::{as_samples_mut, IqSample, BYTES_PER_SAMPLE},
    error::{Error, Result},
};

pub struct SizedFile {
    path: PathBuf,
    // Both are taken on finalization
    file: Option<File>,
    mmap: Option<MmapMut>,
    capacity: u64,
    cursor: u64,
}

impl SizedFile {
    /// Exclusively create `path`, size it to `max_bytes` and map it writable.
    ///
    /// Nothing is left behind on failure.
    pub fn create(path: impl AsRef<Path>, max_bytes: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if max_bytes < BYTES_PER_SAMPLE as u64 {
            return Err(Error::InvalidLength {
                len: max_bytes,
                capacity: max_bytes,
            });
        }

        let mut options = OpenOptions::new();
        options.read(true).write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o640);
        }
        let file = options.open(&path).map_err(|source| {
            if source.kind() == io::ErrorKind::AlreadyExists {
                Error::AlreadyExists { path: path.clone() }
            } else {
                Error::AllocationFailed {
                    path: path.clone(),
                    size: max_bytes,
                    source,
                }
            }
        })?;

        if let Err(source) = file.set_len(max_bytes) {
            drop(file);
            discard(&path);
            return Err(Error::AllocationFailed {
                path,
                size: max_bytes,
                source,
            });
        }

        let map_len = match usize::try_from(max_bytes) {
            Ok(len) => len,
            Err(_) => {
                drop(file);
                discard(&path);
                return Err(Error::MappingFailed {
                    path,
                    source: io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "size exceeds the address space",
                    ),
                });
            }
        };
        // Safety: we created the file exclusively and nothing else in this
        // process touches it while the mapping is alive.
        let mmap = match unsafe { MmapOptions::new().len(map_len).map_mut(&file) } {
            Ok(m) => m,
            Err(source) => {
                drop(file);
                discard(&path);
                return Err(Error::MappingFailed { path, source });
            }
        };

        debug!("Mapped {} ({} bytes)", path.display(), max_bytes);
        Ok(Self {
            path,
            file: Some(file),
            mmap: Some(mmap),
            capacity: max_bytes,
            cursor: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Declared size in bytes
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Offset of the first byte not yet holding sample data
    pub fn write_cursor(&self) -> u64 {
        self.cursor
    }

    /// Whole samples that still fit after the cursor
    pub fn remaining_samples(&self) -> usize {
        ((self.capacity - self.cursor) / BYTES_PER_SAMPLE as u64) as usize
    }

    /// The reserved region after the cursor, as samples to be filled in place
    pub fn unwritten_mut(&mut self) -> Result<&mut [IqSample]> {
        let start = self.cursor as usize;
        let end = start + self.remaining_samples() * BYTES_PER_SAMPLE;
        let mmap = self.mmap.as_mut().ok_or_else(|| Error::Finalize {
            path: self.path.clone(),
            source: io::Error::new(io::ErrorKind::Other, "region already released"),
        })?;
        as_samples_mut(&mut mmap[start..end])
    }

    /// Mark `bytes` more of the region as valid sample data
    pub fn advance(&mut self, bytes: u64) -> Result<()> {
        let next = self.cursor + bytes;
        if bytes % BYTES_PER_SAMPLE as u64 != 0 || next > self.capacity {
            return Err(Error::InvalidLength {
                len: next,
                capacity: self.capacity,
            });
        }
        self.cursor = next;
        Ok(())
    }

    /// Flush the first `written_bytes`, cut the file to that length and release it.
    ///
    /// If `written_bytes` is rejected the file is still finalized, at the cursor.
    pub fn close(mut self, written_bytes: u64) -> Result<u64> {
        if written_bytes % BYTES_PER_SAMPLE as u64 != 0 || written_bytes > self.capacity {
            return Err(Error::InvalidLength {
                len: written_bytes,
                capacity: self.capacity,
            });
        }
        self.finalize(written_bytes)?;
        Ok(written_bytes)
    }

    fn finalize(&mut self, written_bytes: u64) -> Result<()> {
        let (Some(mmap), Some(file)) = (self.mmap.take(), self.file.take()) else {
            return Ok(());
        };
        let flushed = if written_bytes > 0 {
            mmap.flush_range(0, written_bytes as usize)
        } else {
            Ok(())
        };
        drop(mmap);
        // Truncate even when the flush failed, the pages are still in the cache
        let truncated = file.set_len(written_bytes);
        drop(file);
        debug!(
            "Finalized {} at {} bytes",
            self.path.display(),
            written_bytes
        );
        flushed.and(truncated).map_err(|source| Error::Finalize {
            path: self.path.clone(),
            source,
        })
    }
}

impl Drop for SizedFile {
    fn drop(&mut self) {
        if self.mmap.is_some() {
            let written = self.cursor;
            if let Err(e) = self.finalize(written) {
                warn!("{}", e);
            }
        }
    }
}

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!("Failed to remove {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complex::Complex;

    #[test]
    fn test_create_preallocates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.iq");
        let file = SizedFile::create(&path, 4096).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 4096);
        assert_eq!(file.write_cursor(), 0);
        assert_eq!(file.remaining_samples(), 1024);
        file.close(0).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_create_refuses_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.iq");
        fs::write(&path, b"keep me").unwrap();
        assert!(matches!(
            SizedFile::create(&path, 4096),
            Err(Error::AlreadyExists { .. })
        ));
        assert_eq!(fs::read(&path).unwrap(), b"keep me");
    }

    #[test]
    fn test_zero_capacity_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.iq");
        assert!(SizedFile::create(&path, 0).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_close_truncates_to_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.iq");
        let mut file = SizedFile::create(&path, 4096).unwrap();
        {
            let region = file.unwritten_mut().unwrap();
            region[0] = Complex::new(1, -1);
            region[1] = Complex::new(i16::MAX, i16::MIN);
        }
        file.advance(8).unwrap();
        assert_eq!(file.remaining_samples(), 1022);
        let written = file.write_cursor();
        assert_eq!(file.close(written).unwrap(), 8);

        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 8);
        assert_eq!(i16::from_le_bytes([bytes[0], bytes[1]]), 1);
        assert_eq!(i16::from_le_bytes([bytes[2], bytes[3]]), -1);
        assert_eq!(i16::from_le_bytes([bytes[4], bytes[5]]), i16::MAX);
        assert_eq!(i16::from_le_bytes([bytes[6], bytes[7]]), i16::MIN);
    }

    #[test]
    fn test_advance_past_capacity_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = SizedFile::create(dir.path().join("out.iq"), 16).unwrap();
        file.advance(16).unwrap();
        assert!(file.advance(4).is_err());
        assert!(file.advance(0).is_ok());
        assert_eq!(file.remaining_samples(), 0);
        assert!(file.unwritten_mut().unwrap().is_empty());
    }

    #[test]
    fn test_drop_finalizes_at_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.iq");
        {
            let mut file = SizedFile::create(&path, 4096).unwrap();
            file.advance(400).unwrap();
        }
        assert_eq!(fs::metadata(&path).unwrap().len(), 400);
    }

    #[test]
    fn test_bad_close_length_still_finalizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.iq");
        let mut file = SizedFile::create(&path, 4096).unwrap();
        file.advance(12).unwrap();
        assert!(matches!(
            file.close(6),
            Err(Error::InvalidLength { len: 6, .. })
        ));
        assert_eq!(fs::metadata(&path).unwrap().len(), 12);
    }
}
