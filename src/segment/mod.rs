//! # Segment Files
//!
//! A segment is one append-only file of [`LogRecord`]s plus the write cursor
//! marking where the next record goes. The engine keeps one **active**
//! segment that receives appends and any number of **retired** segments that
//! are only read.
//!
//! Segment files are named `<9-digit zero-padded id>.data`, so a
//! lexicographic directory listing is also numeric file-id order.
//!
//! ## Reading
//!
//! [`Segment::read_record`] decodes the record starting at a byte offset. It
//! distinguishes two outcomes that callers treat very differently:
//!
//! - `Ok(None)` — end of meaningful data: physical EOF, the all-zero
//!   sentinel header, or a record whose bytes run past EOF (torn write).
//! - `Err(SegmentError::InvalidChecksum)` — the bytes are there but do not
//!   match their checksum. Scans must stop here rather than skip ahead.

#[cfg(test)]
mod tests;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::fio::{self, IoManager, IoType};
use crate::record::{self, LogRecord, MAX_RECORD_HEADER_SIZE, RecordError};

/// Extension of segment files.
pub const SEGMENT_FILE_SUFFIX: &str = ".data";

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors returned by segment operations.
#[derive(Debug, Error)]
pub enum SegmentError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A record failed checksum verification.
    #[error("invalid checksum in segment {file_id} at offset {offset}")]
    InvalidChecksum {
        /// Segment holding the record.
        file_id: u32,
        /// Offset where the record starts.
        offset: u64,
    },

    /// Record codec failure other than a checksum mismatch.
    #[error("Record error: {0}")]
    Record(#[from] RecordError),
}

// ------------------------------------------------------------------------------------------------
// Naming
// ------------------------------------------------------------------------------------------------

/// Path of segment `file_id` inside `dir`.
pub fn segment_file_path(dir: &Path, file_id: u32) -> PathBuf {
    dir.join(format!("{file_id:09}{SEGMENT_FILE_SUFFIX}"))
}

/// Parses the file id out of a segment file name.
///
/// Returns `None` for names without the segment suffix and `Some(Err(name))`
/// for names with the suffix whose stem is not a valid id.
pub fn parse_file_id(name: &str) -> Option<Result<u32, String>> {
    let stem = name.strip_suffix(SEGMENT_FILE_SUFFIX)?;
    Some(stem.parse::<u32>().map_err(|_| name.to_string()))
}

// ------------------------------------------------------------------------------------------------
// Segment
// ------------------------------------------------------------------------------------------------

/// One open segment file.
pub struct Segment {
    /// Monotonic file id.
    file_id: u32,

    /// Position of the next append.
    write_offset: u64,

    /// Exclusively owned file handle.
    io: Box<dyn IoManager>,
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("file_id", &self.file_id)
            .field("write_offset", &self.write_offset)
            .finish_non_exhaustive()
    }
}

impl Segment {
    /// Opens (or creates) segment `file_id` in `dir`.
    ///
    /// The write cursor starts at zero; recovery moves it to the end of the
    /// valid data.
    pub fn open(dir: &Path, file_id: u32, io_type: IoType) -> Result<Self, SegmentError> {
        let path = segment_file_path(dir, file_id);
        let io = fio::new_io_manager(&path, io_type)?;
        debug!(file_id, ?io_type, path = %path.display(), "segment opened");
        Ok(Self {
            file_id,
            write_offset: 0,
            io,
        })
    }

    /// Segment file id.
    pub fn file_id(&self) -> u32 {
        self.file_id
    }

    /// Offset the next append will start at.
    pub fn write_offset(&self) -> u64 {
        self.write_offset
    }

    /// Moves the write cursor (used after replay).
    pub fn set_write_offset(&mut self, offset: u64) {
        self.write_offset = offset;
    }

    /// Appends `buf` and advances the write cursor by the bytes written.
    ///
    /// Returns the offset at which `buf` starts. A failed write is cut back
    /// to the cursor so the file never ends in a partial record.
    pub fn write(&mut self, buf: &[u8]) -> Result<u64, SegmentError> {
        let start = self.write_offset;
        let n = match self.io.write(buf) {
            Ok(n) => n,
            Err(e) => {
                self.discard_partial_write();
                return Err(e.into());
            }
        };
        self.write_offset += n as u64;
        trace!(file_id = self.file_id, start, len = n, "segment write");
        Ok(start)
    }

    /// Restores `write_offset == file length` after a failed append.
    ///
    /// Falls back to adopting the physical length when the file cannot be
    /// shrunk.
    fn discard_partial_write(&mut self) {
        match self.io.truncate(self.write_offset) {
            Ok(()) => {
                debug!(
                    file_id = self.file_id,
                    offset = self.write_offset,
                    "partial write discarded"
                );
            }
            Err(e) => {
                warn!(file_id = self.file_id, error = %e, "cannot discard partial write");
                if let Ok(size) = self.io.size() {
                    self.write_offset = size;
                }
            }
        }
    }

    /// Flushes appended data to durable storage.
    pub fn sync(&self) -> Result<(), SegmentError> {
        Ok(self.io.sync()?)
    }

    /// Physical file length.
    pub fn size(&self) -> Result<u64, SegmentError> {
        Ok(self.io.size()?)
    }

    /// Cuts the file to `len` bytes and moves the write cursor there.
    pub fn truncate(&mut self, len: u64) -> Result<(), SegmentError> {
        self.io.truncate(len)?;
        self.write_offset = len;
        Ok(())
    }

    /// Replaces the file handle with one of `io_type`, keeping the cursor.
    pub fn reopen_with(&mut self, dir: &Path, io_type: IoType) -> Result<(), SegmentError> {
        let path = segment_file_path(dir, self.file_id);
        self.io = fio::new_io_manager(&path, io_type)?;
        Ok(())
    }

    /// Reads the record that starts at `offset`.
    ///
    /// Returns the record and its total on-disk length, or `None` when there
    /// is no further valid record at or after `offset`.
    pub fn read_record(&self, offset: u64) -> Result<Option<(LogRecord, u64)>, SegmentError> {
        let size = self.io.size()?;
        if offset >= size {
            return Ok(None);
        }

        // Probe a fixed-size window; the header may be shorter.
        let probe_len = (MAX_RECORD_HEADER_SIZE as u64).min(size - offset) as usize;
        let mut probe = vec![0u8; probe_len];
        let n = self.io.read(&mut probe, offset)?;
        probe.truncate(n);

        let Some((header, header_len)) = record::decode_header(&probe) else {
            return Ok(None);
        };
        if header.is_end_of_segment() {
            return Ok(None);
        }

        let payload_start = offset + header_len as u64;
        let record_len = header_len as u64 + header.payload_len();
        if offset + record_len > size {
            debug!(
                file_id = self.file_id,
                offset,
                record_len,
                size,
                "record runs past end of segment"
            );
            return Ok(None);
        }

        let mut payload = vec![0u8; header.payload_len() as usize];
        let n = self.io.read(&mut payload, payload_start)?;
        if n < payload.len() {
            return Ok(None);
        }

        match record::decode_payload(&header, &payload) {
            Ok(record) => Ok(Some((record, record_len))),
            Err(RecordError::ChecksumMismatch { .. }) => Err(SegmentError::InvalidChecksum {
                file_id: self.file_id,
                offset,
            }),
            Err(e) => Err(e.into()),
        }
    }
}
