use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use tracing_subscriber::EnvFilter;

use crate::fio::IoType;
use crate::record::{LogRecord, encode_record};
use crate::segment::{Segment, segment_file_path};

/// Initialize tracing subscriber controlled by `RUST_LOG` env var.
/// Safe to call multiple times — only the first call takes effect.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Opens segment `file_id` with a standard file handle.
pub fn open_segment(dir: &Path, file_id: u32) -> Segment {
    init_tracing();
    Segment::open(dir, file_id, IoType::Standard).unwrap()
}

/// Encodes and appends `record`, returning `(offset, encoded_len)`.
pub fn append(seg: &mut Segment, record: &LogRecord) -> (u64, u64) {
    let bytes = encode_record(record).unwrap();
    let offset = seg.write(&bytes).unwrap();
    (offset, bytes.len() as u64)
}

/// Overwrites bytes of segment `file_id` starting at `offset`.
pub fn overwrite_at(dir: &Path, file_id: u32, offset: u64, bytes: &[u8]) {
    let mut f = OpenOptions::new()
        .write(true)
        .open(segment_file_path(dir, file_id))
        .unwrap();
    f.seek(SeekFrom::Start(offset)).unwrap();
    f.write_all(bytes).unwrap();
    f.sync_all().unwrap();
}

/// Appends raw bytes to the end of segment `file_id`, bypassing the codec.
pub fn append_raw(dir: &Path, file_id: u32, bytes: &[u8]) {
    let mut f = OpenOptions::new()
        .append(true)
        .open(segment_file_path(dir, file_id))
        .unwrap();
    f.write_all(bytes).unwrap();
    f.sync_all().unwrap();
}

/// XORs the byte at `offset` of segment `file_id` with `0xFF`.
pub fn flip_byte(dir: &Path, file_id: u32, offset: u64) {
    let path = segment_file_path(dir, file_id);
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[offset as usize] ^= 0xFF;
    std::fs::write(&path, bytes).unwrap();
}
