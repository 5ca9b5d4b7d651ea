//! Startup recovery: segment discovery and index replay.
//!
//! The index is never persisted. On open every segment file is replayed in
//! ascending file-id order, which is also creation order, and every record is
//! applied to a fresh index. A later record for a key simply overwrites the
//! earlier position, so the index ends up holding each live key's newest
//! record.
//!
//! A segment's scan stops at its end of data or at the first record that fails
//! checksum verification. Nothing after a corrupt record is trusted. For the
//! active segment the unreadable tail is cut off so new appends continue
//! directly after the last valid record.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use super::{EngineConfig, EngineError};
use crate::fio::IoType;
use crate::index::Indexer;
use crate::record::{RecordPos, RecordType};
use crate::segment::{self, Segment, SegmentError};

/// Summary of what the startup replay found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Segment files scanned.
    pub segments_replayed: usize,

    /// Records applied to the index (puts and tombstones).
    pub records_replayed: u64,

    /// Tombstone records among `records_replayed`.
    pub tombstones_replayed: u64,

    /// Segments whose scan stopped at a checksum failure.
    pub corrupted_segments: Vec<u32>,

    /// Bytes cut from the tail of the active segment.
    pub truncated_bytes: u64,
}

/// Segment state rebuilt from disk.
pub(crate) struct Recovered {
    pub(crate) active: Option<Segment>,
    pub(crate) retired: HashMap<u32, Segment>,
    pub(crate) file_ids: Vec<u32>,
    pub(crate) report: RecoveryReport,
}

/// Lists the segment file ids in `dir`, ascending.
///
/// Files without the segment suffix are ignored. A segment-suffixed name whose
/// stem is not a number fails with [`EngineError::InvalidSegmentName`].
pub(crate) fn discover_file_ids(dir: &Path) -> Result<Vec<u32>, EngineError> {
    let mut ids = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        match segment::parse_file_id(name) {
            None => {}
            Some(Ok(id)) => ids.push(id),
            Some(Err(bad)) => return Err(EngineError::InvalidSegmentName(bad)),
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

/// Opens every segment in `dir` and replays it into `index`.
pub(crate) fn recover(
    dir: &Path,
    config: &EngineConfig,
    index: &dyn Indexer,
) -> Result<Recovered, EngineError> {
    let file_ids = discover_file_ids(dir)?;
    let mut report = RecoveryReport::default();

    let Some(&active_id) = file_ids.last() else {
        info!(dir = %dir.display(), "no segments found, starting empty");
        return Ok(Recovered {
            active: None,
            retired: HashMap::new(),
            file_ids,
            report,
        });
    };

    let scan_io = if config.mmap_at_startup {
        IoType::Mmap
    } else {
        IoType::Standard
    };

    let mut segments = Vec::with_capacity(file_ids.len());
    for &fid in &file_ids {
        segments.push(Segment::open(dir, fid, scan_io)?);
    }

    let mut active_valid_end = 0;
    for seg in &segments {
        let valid_end = replay_segment(seg, index, &mut report)?;
        report.segments_replayed += 1;
        if seg.file_id() == active_id {
            active_valid_end = valid_end;
        }
    }

    let mut retired = HashMap::with_capacity(segments.len().saturating_sub(1));
    let mut active = None;
    for mut seg in segments {
        if scan_io != IoType::Standard {
            seg.reopen_with(dir, IoType::Standard)?;
        }
        if seg.file_id() == active_id {
            active = Some(seg);
        } else {
            retired.insert(seg.file_id(), seg);
        }
    }

    if let Some(seg) = active.as_mut() {
        let size = seg.size()?;
        if active_valid_end < size {
            seg.truncate(active_valid_end)?;
            report.truncated_bytes = size - active_valid_end;
            warn!(
                file_id = active_id,
                valid_end = active_valid_end,
                discarded = report.truncated_bytes,
                "truncated unreadable tail of active segment"
            );
        } else {
            seg.set_write_offset(active_valid_end);
        }
    }

    info!(
        segments = report.segments_replayed,
        records = report.records_replayed,
        tombstones = report.tombstones_replayed,
        corrupted = report.corrupted_segments.len(),
        keys = index.len(),
        active_file_id = active_id,
        "recovery complete"
    );

    Ok(Recovered {
        active,
        retired,
        file_ids,
        report,
    })
}

/// Applies every valid record of `seg` to `index`.
///
/// Returns the offset just past the last valid record.
fn replay_segment(
    seg: &Segment,
    index: &dyn Indexer,
    report: &mut RecoveryReport,
) -> Result<u64, EngineError> {
    let file_id = seg.file_id();
    let mut offset = 0;

    loop {
        let (record, len) = match seg.read_record(offset) {
            Ok(Some(found)) => found,
            Ok(None) => break,
            Err(SegmentError::InvalidChecksum { file_id, offset }) => {
                warn!(file_id, offset, "checksum mismatch, stopping segment replay");
                report.corrupted_segments.push(file_id);
                break;
            }
            Err(e) => return Err(e.into()),
        };

        match record.rec_type {
            RecordType::Tombstone => {
                index.delete(&record.key);
                report.tombstones_replayed += 1;
            }
            RecordType::Normal => {
                if !index.put(record.key, RecordPos { file_id, offset }) {
                    return Err(EngineError::IndexUpdateFailed);
                }
            }
        }
        report.records_replayed += 1;
        offset += len;
    }

    debug!(file_id, valid_end = offset, "segment replayed");
    Ok(offset)
}
