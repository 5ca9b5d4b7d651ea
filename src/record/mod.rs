//! # Log Record Codec
//!
//! Every mutation is appended to a segment as one self-describing record.
//! This module owns the byte layout of that record and the checksum that
//! protects it.
//!
//! # On-disk layout
//!
//! ```text
//! [CRC32_LE (4)][TYPE (1)][KEY_LEN uvarint][VALUE_LEN uvarint][KEY][VALUE]
//! ```
//!
//! - **CRC32** — computed over `TYPE || KEY || VALUE`, so it does not depend
//!   on how many bytes the two varints occupy.
//! - **TYPE** — [`RecordType`] discriminant.
//! - **KEY_LEN / VALUE_LEN** — unsigned LEB128, 1 to 5 bytes each.
//!
//! The header is therefore at most [`MAX_RECORD_HEADER_SIZE`] bytes, which
//! readers use as a fixed-size probe before they know the true header length.
//!
//! # End-of-segment sentinel
//!
//! A header whose checksum, key length, and value length are all zero marks
//! the logical end of a segment (zero-filled or partially written tails). A
//! genuine record can never produce it: even an empty key and value still
//! checksum the type byte to a non-zero CRC.

#[cfg(test)]
mod tests;

use crc32fast::Hasher as Crc32;
use thiserror::Error;

use crate::encoding::{self, Decode, Encode, EncodingError, MAX_VARINT_LEN32, VarU32};

const U32_SIZE: usize = std::mem::size_of::<u32>();

/// Upper bound on the encoded header: checksum, type byte, two varints.
pub const MAX_RECORD_HEADER_SIZE: usize = U32_SIZE + 1 + 2 * MAX_VARINT_LEN32;

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors returned by the record codec.
#[derive(Debug, Error)]
pub enum RecordError {
    /// Key or value length cannot be represented in the header.
    #[error("record too large: {0}")]
    TooLarge(String),

    /// Stored checksum does not match the record contents.
    #[error("checksum mismatch (stored {stored:08x}, computed {computed:08x})")]
    ChecksumMismatch {
        /// CRC read from the header.
        stored: u32,
        /// CRC recomputed over `type || key || value`.
        computed: u32,
    },

    /// The type byte is not a known [`RecordType`].
    #[error("unknown record type {0:#04x}")]
    UnknownType(u8),

    /// Low-level encoding failure.
    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),
}

// ------------------------------------------------------------------------------------------------
// Record structures
// ------------------------------------------------------------------------------------------------

/// What a record does to its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// Sets the key to the record's value.
    Normal = 0,

    /// Marks the key as deleted. Carries no value.
    Tombstone = 1,
}

impl TryFrom<u8> for RecordType {
    type Error = RecordError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0 => Ok(RecordType::Normal),
            1 => Ok(RecordType::Tombstone),
            other => Err(RecordError::UnknownType(other)),
        }
    }
}

/// A logical write: one key, its value, and the kind of mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// The user key.
    pub key: Vec<u8>,

    /// The value; empty for tombstones.
    pub value: Vec<u8>,

    /// Kind of mutation.
    pub rec_type: RecordType,
}

impl LogRecord {
    /// Builds a [`RecordType::Normal`] record.
    pub fn normal(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self {
            key,
            value,
            rec_type: RecordType::Normal,
        }
    }

    /// Builds a [`RecordType::Tombstone`] record with an empty value.
    pub fn tombstone(key: Vec<u8>) -> Self {
        Self {
            key,
            value: Vec::new(),
            rec_type: RecordType::Tombstone,
        }
    }
}

/// Decoded record header.
///
/// `rec_type` is kept as the raw byte: it is only interpreted after the
/// checksum has been verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Stored CRC32 over `type || key || value`.
    pub crc: u32,

    /// Raw record type byte.
    pub rec_type: u8,

    /// Key length in bytes.
    pub key_size: u32,

    /// Value length in bytes.
    pub value_size: u32,
}

impl RecordHeader {
    /// True for the all-zero header that marks the logical end of a segment.
    pub fn is_end_of_segment(&self) -> bool {
        self.crc == 0 && self.key_size == 0 && self.value_size == 0
    }

    /// Bytes occupied by key and value after the header.
    pub fn payload_len(&self) -> u64 {
        u64::from(self.key_size) + u64::from(self.value_size)
    }
}

/// Location of a record: segment file id and the byte offset where the
/// record starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordPos {
    /// Segment file id.
    pub file_id: u32,

    /// Offset of the first header byte.
    pub offset: u64,
}

// ------------------------------------------------------------------------------------------------
// Codec
// ------------------------------------------------------------------------------------------------

/// CRC32 over `type || key || value`.
pub fn record_crc(rec_type: u8, key: &[u8], value: &[u8]) -> u32 {
    let mut hasher = Crc32::new();
    hasher.update(&[rec_type]);
    hasher.update(key);
    hasher.update(value);
    hasher.finalize()
}

/// Encodes `record` into its on-disk byte layout.
///
/// The returned buffer's length is the record's full on-disk size.
pub fn encode_record(record: &LogRecord) -> Result<Vec<u8>, RecordError> {
    let key_size = encoding::len_to_u32(record.key.len())
        .map_err(|_| RecordError::TooLarge(format!("key of {} bytes", record.key.len())))?;
    let value_size = encoding::len_to_u32(record.value.len())
        .map_err(|_| RecordError::TooLarge(format!("value of {} bytes", record.value.len())))?;

    let rec_type = record.rec_type as u8;
    let crc = record_crc(rec_type, &record.key, &record.value);

    let mut buf = Vec::with_capacity(
        U32_SIZE
            + 1
            + encoding::varint_len(key_size)
            + encoding::varint_len(value_size)
            + record.key.len()
            + record.value.len(),
    );
    crc.encode_to(&mut buf)?;
    rec_type.encode_to(&mut buf)?;
    VarU32(key_size).encode_to(&mut buf)?;
    VarU32(value_size).encode_to(&mut buf)?;
    buf.extend_from_slice(&record.key);
    buf.extend_from_slice(&record.value);
    Ok(buf)
}

/// Decodes a record header from the start of `buf`.
///
/// Returns the header and the exact number of bytes it occupied, or `None`
/// when `buf` does not hold a complete, well-formed header.
pub fn decode_header(buf: &[u8]) -> Option<(RecordHeader, usize)> {
    if buf.len() <= U32_SIZE {
        return None;
    }

    let mut offset = 0;
    let (crc, n) = u32::decode_from(buf).ok()?;
    offset += n;
    let (rec_type, n) = u8::decode_from(&buf[offset..]).ok()?;
    offset += n;
    let (VarU32(key_size), n) = VarU32::decode_from(&buf[offset..]).ok()?;
    offset += n;
    let (VarU32(value_size), n) = VarU32::decode_from(&buf[offset..]).ok()?;
    offset += n;

    Some((
        RecordHeader {
            crc,
            rec_type,
            key_size,
            value_size,
        },
        offset,
    ))
}

/// Rebuilds a [`LogRecord`] from its header and the `key || value` bytes that
/// follow it, verifying the checksum first.
pub fn decode_payload(header: &RecordHeader, payload: &[u8]) -> Result<LogRecord, RecordError> {
    let key_size = header.key_size as usize;
    let expected = key_size + header.value_size as usize;
    if payload.len() != expected {
        return Err(EncodingError::UnexpectedEof {
            needed: expected,
            available: payload.len(),
        }
        .into());
    }

    let (key, value) = payload.split_at(key_size);
    let computed = record_crc(header.rec_type, key, value);
    if computed != header.crc {
        return Err(RecordError::ChecksumMismatch {
            stored: header.crc,
            computed,
        });
    }

    Ok(LogRecord {
        key: key.to_vec(),
        value: value.to_vec(),
        rec_type: RecordType::try_from(header.rec_type)?,
    })
}
