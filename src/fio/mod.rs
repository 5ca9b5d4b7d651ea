//! # File I/O
//!
//! Thin wrappers over OS file handles used by segments. The [`IoManager`]
//! trait is the only surface the rest of the engine sees, so a segment can be
//! read through a memory map during startup and through a regular file handle
//! afterwards without any change to the callers.
//!
//! Implementations:
//!
//! - [`FileIo`] — a `std::fs::File` opened create + read + append. Writes
//!   always land at the current end of the file.
//! - [`MmapIo`] — a read-only `memmap2` mapping, used for the recovery scan.


mod file_io;
mod mmap;

pub use file_io::FileIo;
pub use mmap::MmapIo;

use std::io;
use std::path::Path;

/// Permissions for newly created segment files.
pub const SEGMENT_FILE_PERM: u32 = 0o644;

/// Byte-level file handle consumed by a segment.
pub trait IoManager: Send + Sync {
    /// Reads into `buf` starting at `offset`. Returns the number of bytes
    /// read, which is short only when the end of the file is reached.
    fn read(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Appends `buf` at the end of the file. Returns bytes written.
    fn write(&self, buf: &[u8]) -> io::Result<usize>;

    /// Flushes written data to durable storage.
    fn sync(&self) -> io::Result<()>;

    /// Current file length.
    fn size(&self) -> io::Result<u64>;

    /// Shrinks the file to `len` bytes.
    fn truncate(&self, len: u64) -> io::Result<()>;
}

/// Selects how a segment's file is accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IoType {
    /// Regular read/append file handle.
    #[default]
    Standard,

    /// Read-only memory map.
    Mmap,
}

/// Opens `path` with the requested access type.
pub fn new_io_manager(path: &Path, io_type: IoType) -> io::Result<Box<dyn IoManager>> {
    match io_type {
        IoType::Standard => Ok(Box::new(FileIo::open(path)?)),
        IoType::Mmap => Ok(Box::new(MmapIo::open(path)?)),
    }
}
