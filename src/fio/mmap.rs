//! Read-only memory-mapped implementation of [`IoManager`].

use std::fs::OpenOptions;
use std::io;
use std::path::Path;

use memmap2::Mmap;

use super::IoManager;

/// A read-only view of a segment file.
///
/// Writes, syncs and truncation are rejected; the engine swaps in a
/// [`FileIo`](super::FileIo) before the first write.
#[derive(Debug)]
pub struct MmapIo {
    map: Mmap,
}

impl MmapIo {
    /// Maps `path` read-only. The file must exist.
    ///
    /// # Safety
    ///
    /// Uses `unsafe { Mmap::map(...) }` but is memory-safe because:
    ///
    /// - The mapping is only held during the recovery scan, before any
    ///   writer exists for this file
    /// - The mmap is read-only
    /// - Every read is bounds-checked against the mapping length
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        let map = unsafe { Mmap::map(&file)? };
        Ok(Self { map })
    }
}

impl IoManager for MmapIo {
    fn read(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let len = self.map.len() as u64;
        if offset >= len {
            return Ok(0);
        }
        let start = offset as usize;
        let end = (start + buf.len()).min(self.map.len());
        let n = end - start;
        buf[..n].copy_from_slice(&self.map[start..end]);
        Ok(n)
    }

    fn write(&self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "memory-mapped segment is read-only",
        ))
    }

    fn sync(&self) -> io::Result<()> {
        Ok(())
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.map.len() as u64)
    }

    fn truncate(&self, _len: u64) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "memory-mapped segment is read-only",
        ))
    }
}
