//! # Log-Structured Storage Engine
//!
//! This module implements a **synchronous**, **crash-safe** bitcask-style
//! storage engine: every mutation is appended to a segment file and a fully
//! in-memory index maps each key to the position of its newest record.
//!
//! ## Design Overview
//!
//! - **Segments** — append-only files named `<id>.data`. Exactly one segment,
//!   the one with the highest id, is *active* and receives appends. All others
//!   are *retired* and only ever read.
//! - **Index** — key → [`RecordPos`], behind the [`Indexer`] trait. Deleted
//!   keys are removed from the index; tombstones only exist on disk.
//! - **Rotation** — when an append would push a non-empty active segment past
//!   [`EngineConfig::max_segment_size`], the active segment is synced and
//!   retired, and segment `id + 1` becomes active.
//!
//! ## Concurrency Model
//!
//! All engine state is protected by a single `Arc<Mutex<EngineInner>>`.
//! Puts, deletes, rotation *and* gets hold the gate for their whole duration,
//! so reads and writes never interleave.
//!
//! ## Guarantees
//!
//! - **Crash recovery:** On [`Engine::open`] every segment is replayed in
//!   file-id order to rebuild the index (see [`recovery`]).
//! - **Latest write wins:** the index always points at the newest record
//!   for each live key.
//! - **Corruption is detected, never skipped:** a checksum failure on read
//!   surfaces as an error; during replay it ends that segment's scan.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing::{debug, info, trace};

use crate::fio::IoType;
use crate::index::{IndexType, Indexer, new_indexer};
use crate::record::{self, LogRecord, RecordError, RecordPos, RecordType};
use crate::segment::{Segment, SegmentError};

pub mod recovery;
pub use recovery::RecoveryReport;

#[cfg(test)]
mod tests;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The key has no live record.
    #[error("Key not found")]
    KeyNotFound,

    /// An index position references a segment the engine does not hold.
    #[error("Segment file {0} not found")]
    FileNotFound(u32),

    /// The index rejected an update after the record was already on disk.
    #[error("Index update failed")]
    IndexUpdateFailed,

    /// A `.data` file in the data directory has a non-numeric name.
    #[error("Invalid segment file name: {0}")]
    InvalidSegmentName(String),

    /// Error originating from a segment file.
    #[error("Segment error: {0}")]
    Segment(#[from] SegmentError),

    /// Error originating from the record codec.
    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    /// Underlying filesystem I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal invariant violation (poisoned lock, unexpected state, etc.).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration for an [`Engine`] instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Size (bytes) past which the active segment is rotated.
    pub max_segment_size: u64,

    /// Sync the active segment after every append.
    pub sync_writes: bool,

    /// Index backend.
    pub index_type: IndexType,

    /// Read segments through a memory map during the startup replay.
    pub mmap_at_startup: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_segment_size: 256 * 1024 * 1024,
            sync_writes: false,
            index_type: IndexType::BTree,
            mmap_at_startup: false,
        }
    }
}

/// Snapshot of engine statistics returned by [`Engine::stats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStats {
    /// Number of live keys in the index.
    pub key_count: usize,
    /// Id of the active segment, if one exists yet.
    pub active_file_id: Option<u32>,
    /// Number of retired segments.
    pub retired_count: usize,
    /// All segment ids, ascending.
    pub file_ids: Vec<u32>,
    /// Sum of all segment file sizes in bytes.
    pub total_size_bytes: u64,
}

struct EngineInner {
    /// Segment receiving appends. `None` until the first write on an empty
    /// directory.
    active: Option<Segment>,

    /// Read-only segments keyed by file id.
    retired: HashMap<u32, Segment>,

    /// Every segment id, ascending.
    file_ids: Vec<u32>,

    /// Key → newest record position.
    index: Box<dyn Indexer>,

    /// Directory holding the segment files.
    data_dir: PathBuf,

    config: EngineConfig,

    /// What the startup replay found.
    recovery: RecoveryReport,
}

/// The main storage engine handle.
///
/// Thread-safe — can be cloned and shared across threads via the
/// internal `Arc<Mutex<_>>`.
pub struct Engine {
    inner: Arc<Mutex<EngineInner>>,
}

impl Clone for Engine {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Engine {
    // --------------------------------------------------------------------------------------------
    // Lock helpers
    // --------------------------------------------------------------------------------------------

    /// Acquires the engine gate.
    fn lock(&self) -> Result<MutexGuard<'_, EngineInner>, EngineError> {
        self.inner
            .lock()
            .map_err(|_| EngineError::Internal("Mutex poisoned".into()))
    }

    // --------------------------------------------------------------------------------------------
    // Lifecycle
    // --------------------------------------------------------------------------------------------

    /// Opens (or creates) an engine rooted at the given directory.
    ///
    /// A missing directory is created. Existing segments are replayed to
    /// rebuild the index before this returns.
    pub fn open(path: impl AsRef<Path>, config: EngineConfig) -> Result<Self, EngineError> {
        let data_dir = path.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)?;

        let index = new_indexer(config.index_type);
        let recovered = recovery::recover(&data_dir, &config, index.as_ref())?;

        info!(
            dir = %data_dir.display(),
            segments = recovered.file_ids.len(),
            keys = index.len(),
            "engine opened"
        );

        let inner = EngineInner {
            active: recovered.active,
            retired: recovered.retired,
            file_ids: recovered.file_ids,
            index,
            data_dir,
            config,
            recovery: recovered.report,
        };

        Ok(Self {
            inner: Arc::new(Mutex::new(inner)),
        })
    }

    /// Flushes the active segment and fsyncs the data directory.
    pub fn close(&self) -> Result<(), EngineError> {
        let inner = self.lock()?;
        if let Some(active) = inner.active.as_ref() {
            active.sync()?;
        }
        if let Ok(dir) = fs::File::open(&inner.data_dir) {
            dir.sync_all()?;
        }
        debug!(dir = %inner.data_dir.display(), "engine closed");
        Ok(())
    }

    /// Flushes the active segment to durable storage.
    pub fn sync(&self) -> Result<(), EngineError> {
        let inner = self.lock()?;
        if let Some(active) = inner.active.as_ref() {
            active.sync()?;
        }
        Ok(())
    }

    // --------------------------------------------------------------------------------------------
    // Operations
    // --------------------------------------------------------------------------------------------

    /// Insert or overwrite a key-value pair.
    ///
    /// The record is on disk before the index is touched. If the index then
    /// rejects the update the call fails with
    /// [`EngineError::IndexUpdateFailed`]; the next replay indexes the record.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), EngineError> {
        let mut inner = self.lock()?;
        trace!(key_len = key.len(), value_len = value.len(), "engine put");

        let record = LogRecord::normal(key, value);
        let pos = Self::append(&mut inner, &record)?;
        if !inner.index.put(record.key, pos) {
            return Err(EngineError::IndexUpdateFailed);
        }
        Ok(())
    }

    /// Look up the value of `key`.
    ///
    /// Fails with [`EngineError::KeyNotFound`] when the key is absent or its
    /// position holds a tombstone.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>, EngineError> {
        let inner = self.lock()?;
        trace!(key_len = key.len(), "engine get");

        let pos = inner.index.get(key).ok_or(EngineError::KeyNotFound)?;
        let segment = Self::resolve(&inner, pos.file_id)?;
        let (record, _) = segment.read_record(pos.offset)?.ok_or_else(|| {
            EngineError::Internal(format!(
                "no record at segment {} offset {}",
                pos.file_id, pos.offset
            ))
        })?;

        match record.rec_type {
            RecordType::Normal => Ok(record.value),
            RecordType::Tombstone => Err(EngineError::KeyNotFound),
        }
    }

    /// Delete `key`.
    ///
    /// A key that is not live fails with [`EngineError::KeyNotFound`] and
    /// writes nothing.
    pub fn delete(&self, key: &[u8]) -> Result<(), EngineError> {
        let mut inner = self.lock()?;
        trace!(key_len = key.len(), "engine delete");

        if inner.index.get(key).is_none() {
            return Err(EngineError::KeyNotFound);
        }

        Self::append(&mut inner, &LogRecord::tombstone(key.to_vec()))?;
        if !inner.index.delete(key) {
            return Err(EngineError::IndexUpdateFailed);
        }
        Ok(())
    }

    /// Returns a snapshot of engine statistics.
    pub fn stats(&self) -> Result<EngineStats, EngineError> {
        let inner = self.lock()?;

        let mut total_size_bytes = 0;
        for seg in inner.retired.values().chain(inner.active.iter()) {
            total_size_bytes += seg.size()?;
        }

        Ok(EngineStats {
            key_count: inner.index.len(),
            active_file_id: inner.active.as_ref().map(Segment::file_id),
            retired_count: inner.retired.len(),
            file_ids: inner.file_ids.clone(),
            total_size_bytes,
        })
    }

    /// What the startup replay found.
    pub fn recovery_report(&self) -> Result<RecoveryReport, EngineError> {
        Ok(self.lock()?.recovery.clone())
    }

    // --------------------------------------------------------------------------------------------
    // Segment management
    // --------------------------------------------------------------------------------------------

    /// Encodes `record` and appends it to the active segment, rotating first
    /// if it would not fit.
    ///
    /// Returns the position where the record starts.
    fn append(inner: &mut EngineInner, record: &LogRecord) -> Result<RecordPos, EngineError> {
        let bytes = record::encode_record(record)?;
        let len = bytes.len() as u64;

        let needs_rotation = match inner.active.as_ref() {
            None => {
                let first_id = match inner.file_ids.last() {
                    Some(&last) => last.checked_add(1).ok_or_else(|| {
                        EngineError::Internal("segment id space exhausted".into())
                    })?,
                    None => 0,
                };
                Self::open_active(inner, first_id)?;
                false
            }
            Some(active) => {
                active.write_offset() > 0
                    && active.write_offset() + len > inner.config.max_segment_size
            }
        };
        if needs_rotation {
            Self::rotate(inner)?;
        }

        let sync_writes = inner.config.sync_writes;
        let active = inner
            .active
            .as_mut()
            .ok_or_else(|| EngineError::Internal("no active segment".into()))?;
        let offset = active.write(&bytes)?;
        if sync_writes {
            active.sync()?;
        }

        Ok(RecordPos {
            file_id: active.file_id(),
            offset,
        })
    }

    /// Opens the next segment id, then syncs and retires the active one.
    ///
    /// If the next segment cannot be created or the old one cannot be
    /// synced, the old segment stays active.
    fn rotate(inner: &mut EngineInner) -> Result<(), EngineError> {
        let (old_id, old_size) = match inner.active.as_ref() {
            Some(active) => (active.file_id(), active.write_offset()),
            None => {
                return Err(EngineError::Internal(
                    "rotation without active segment".into(),
                ));
            }
        };
        let next_id = old_id
            .checked_add(1)
            .ok_or_else(|| EngineError::Internal("segment id space exhausted".into()))?;

        let next = Segment::open(&inner.data_dir, next_id, IoType::Standard)?;
        if let Some(active) = inner.active.as_ref() {
            active.sync()?;
        }

        if let Some(old) = inner.active.replace(next) {
            inner.retired.insert(old_id, old);
        }
        inner.file_ids.push(next_id);

        info!(
            retired = old_id,
            retired_size = old_size,
            active = next_id,
            "segment rotated"
        );
        Ok(())
    }

    /// Creates segment `file_id` and makes it active.
    fn open_active(inner: &mut EngineInner, file_id: u32) -> Result<(), EngineError> {
        let seg = Segment::open(&inner.data_dir, file_id, IoType::Standard)?;
        inner.active = Some(seg);
        inner.file_ids.push(file_id);
        Ok(())
    }

    /// Finds the segment holding `file_id`.
    fn resolve(inner: &EngineInner, file_id: u32) -> Result<&Segment, EngineError> {
        match inner.active.as_ref() {
            Some(active) if active.file_id() == file_id => Ok(active),
            _ => inner
                .retired
                .get(&file_id)
                .ok_or(EngineError::FileNotFound(file_id)),
        }
    }
}
