//! # SegmentDB
//!
//! An embeddable, persistent key-value store built on a **log-structured,
//! bitcask-style** design: every write is appended to a segment file and an
//! in-memory index maps each key to the location of its newest record.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use segmentdb::{Db, DbConfig, DbError};
//!
//! let db = Db::open("/tmp/my_db", DbConfig::default()).unwrap();
//!
//! // Write
//! db.put(b"hello", b"world").unwrap();
//!
//! // Read
//! assert_eq!(db.get(b"hello").unwrap(), b"world".to_vec());
//!
//! // Delete
//! db.delete(b"hello").unwrap();
//! assert!(matches!(db.get(b"hello"), Err(DbError::KeyNotFound)));
//!
//! // Graceful shutdown
//! db.close().unwrap();
//! ```
//!
//! ## Features
//!
//! - **Append-only segments** — writes never modify existing bytes.
//! - **Segment rotation** — the active file is retired once it reaches the
//!   configured size.
//! - **CRC32 integrity** — every record is checksummed; corruption is
//!   reported, never silently skipped.
//! - **Crash recovery** — the index is rebuilt by replaying all segments on
//!   open; torn or zero-filled tails are cut off.
//! - **Pluggable index** — B-tree or skip list, chosen in [`DbConfig`].

#![allow(dead_code)]

pub(crate) mod encoding;
pub(crate) mod engine;
pub(crate) mod fio;
pub(crate) mod index;
pub(crate) mod record;
pub(crate) mod segment;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use engine::{Engine, EngineConfig, EngineError};
use segment::SegmentError;
use thiserror::Error;
use tracing::{debug, error, info};

pub use engine::RecoveryReport;
pub use index::IndexType;

// ------------------------------------------------------------------------------------------------
// Configuration
// ------------------------------------------------------------------------------------------------

/// Configuration for a [`Db`] instance.
///
/// All fields have sensible defaults via [`DbConfig::default()`].
/// The configuration is validated when passed to [`Db::open`].
///
/// # Example
///
/// ```rust
/// use segmentdb::{DbConfig, IndexType};
///
/// // Use defaults (256 MiB segments, B-tree index)
/// let config = DbConfig::default();
///
/// // Or customize
/// let config = DbConfig {
///     max_segment_size: 64 * 1024 * 1024,
///     index_type: IndexType::SkipList,
///     ..DbConfig::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Size in bytes past which the active segment is retired and a new one
    /// is started. A single record larger than this still goes into an
    /// empty segment.
    ///
    /// Default: 256 MiB. Must be > 0.
    pub max_segment_size: u64,

    /// Fsync the active segment after every write.
    ///
    /// Default: `false`.
    pub sync_writes: bool,

    /// Index backend.
    ///
    /// Default: [`IndexType::BTree`].
    pub index_type: IndexType,

    /// Read segments through memory maps during the startup replay.
    ///
    /// Default: `false`.
    pub mmap_at_startup: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            max_segment_size: 256 * 1024 * 1024,
            sync_writes: false,
            index_type: IndexType::BTree,
            mmap_at_startup: false,
        }
    }
}

impl DbConfig {
    /// Validates all configuration parameters.
    fn validate(&self) -> Result<(), DbError> {
        if self.max_segment_size == 0 {
            return Err(DbError::InvalidConfig(
                "max_segment_size must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Converts to the internal engine configuration.
    fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_segment_size: self.max_segment_size,
            sync_writes: self.sync_writes,
            index_type: self.index_type,
            mmap_at_startup: self.mmap_at_startup,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Error type
// ------------------------------------------------------------------------------------------------

/// Errors returned by [`Db`] operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// The database has been closed.
    #[error("database is closed")]
    Closed,

    /// Invalid configuration parameter.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The key is empty.
    #[error("key must not be empty")]
    EmptyKey,

    /// The key has no live value.
    #[error("key not found")]
    KeyNotFound,

    /// The index referenced a segment that is not open.
    #[error("segment file {0} not found")]
    FileNotFound(u32),

    /// A record reached disk but the index could not be updated. The record
    /// is indexed again on the next open.
    #[error("index update failed")]
    IndexUpdateFailed,

    /// A record failed checksum verification.
    #[error("invalid checksum in segment {file_id} at offset {offset}")]
    InvalidChecksum {
        /// Segment holding the damaged record.
        file_id: u32,
        /// Offset where the damaged record starts.
        offset: u64,
    },

    /// An engine-internal error occurred.
    #[error("{0}")]
    Engine(EngineError),
}

impl From<EngineError> for DbError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::KeyNotFound => DbError::KeyNotFound,
            EngineError::FileNotFound(fid) => DbError::FileNotFound(fid),
            EngineError::IndexUpdateFailed => DbError::IndexUpdateFailed,
            EngineError::Segment(SegmentError::InvalidChecksum { file_id, offset }) => {
                DbError::InvalidChecksum { file_id, offset }
            }
            other => DbError::Engine(other),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Statistics
// ------------------------------------------------------------------------------------------------

/// Point-in-time statistics returned by [`Db::stats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbStats {
    /// Number of live keys.
    pub key_count: usize,
    /// Id of the segment receiving writes, `None` before the first write.
    pub active_file_id: Option<u32>,
    /// Number of read-only segments.
    pub retired_count: usize,
    /// Every segment id, ascending.
    pub file_ids: Vec<u32>,
    /// Total bytes across all segment files.
    pub total_size_bytes: u64,
}

// ------------------------------------------------------------------------------------------------
// Database handle
// ------------------------------------------------------------------------------------------------

/// The main database handle.
///
/// Provides a high-level, thread-safe API for reading and writing
/// key-value pairs.
///
/// # Thread safety
///
/// `Db` is `Send + Sync` — it can be shared across threads via
/// `Arc<Db>`. All operations are serialised internally.
///
/// # Shutdown
///
/// Call [`Db::close`] for a graceful shutdown. If the handle is dropped
/// without calling `close`, the destructor will attempt cleanup, but
/// errors are only logged.
pub struct Db {
    engine: Engine,
    closed: AtomicBool,
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Db {
    /// Opens (or creates) a database at the given directory.
    ///
    /// A missing directory is created. Existing segment files are replayed
    /// to rebuild the index before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidConfig`] if the path is empty or any
    /// configuration parameter is out of range. No file is touched in that
    /// case.
    pub fn open(path: impl AsRef<Path>, config: DbConfig) -> Result<Self, DbError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(DbError::InvalidConfig("path must not be empty".into()));
        }
        config.validate()?;

        let engine = Engine::open(path, config.to_engine_config())?;

        info!(
            path = %path.display(),
            max_segment_size = config.max_segment_size,
            index = ?config.index_type,
            "database opened"
        );

        Ok(Self {
            engine,
            closed: AtomicBool::new(false),
        })
    }

    /// Gracefully shuts down the database.
    ///
    /// Flushes the active segment to disk. Subsequent operations on this
    /// handle return [`DbError::Closed`]. Calling `close` more than once is
    /// harmless.
    pub fn close(&self) -> Result<(), DbError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(()); // Already closed.
        }

        self.engine.close()?;

        info!("database closed");
        Ok(())
    }

    // --------------------------------------------------------------------------------------------
    // Write operations
    // --------------------------------------------------------------------------------------------

    /// Inserts or updates a key-value pair.
    ///
    /// The value may be empty.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::EmptyKey`] if `key` is empty, even on a closed
    /// handle.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<(), DbError> {
        check_key(key)?;
        self.check_open()?;

        self.engine.put(key.to_vec(), value.to_vec())?;
        Ok(())
    }

    /// Deletes a key by appending a tombstone.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::EmptyKey`] if `key` is empty and
    /// [`DbError::KeyNotFound`] if it has no live value; nothing is written
    /// in either case.
    pub fn delete(&self, key: &[u8]) -> Result<(), DbError> {
        check_key(key)?;
        self.check_open()?;

        self.engine.delete(key)?;
        Ok(())
    }

    /// Flushes the active segment to durable storage.
    pub fn sync(&self) -> Result<(), DbError> {
        self.check_open()?;
        self.engine.sync()?;
        Ok(())
    }

    // --------------------------------------------------------------------------------------------
    // Read operations
    // --------------------------------------------------------------------------------------------

    /// Retrieves the value associated with a key.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::EmptyKey`] if `key` is empty,
    /// [`DbError::KeyNotFound`] if it has no live value, and
    /// [`DbError::InvalidChecksum`] if its record is damaged on disk.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>, DbError> {
        check_key(key)?;
        self.check_open()?;

        Ok(self.engine.get(key)?)
    }

    /// Returns a snapshot of database statistics.
    pub fn stats(&self) -> Result<DbStats, DbError> {
        self.check_open()?;
        let stats = self.engine.stats()?;
        Ok(DbStats {
            key_count: stats.key_count,
            active_file_id: stats.active_file_id,
            retired_count: stats.retired_count,
            file_ids: stats.file_ids,
            total_size_bytes: stats.total_size_bytes,
        })
    }

    /// Returns what the startup replay found.
    pub fn recovery_report(&self) -> Result<RecoveryReport, DbError> {
        self.check_open()?;
        Ok(self.engine.recovery_report()?)
    }

    // --------------------------------------------------------------------------------------------
    // Internal helpers
    // --------------------------------------------------------------------------------------------

    /// Returns `Err(DbError::Closed)` if the database has been closed.
    fn check_open(&self) -> Result<(), DbError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DbError::Closed);
        }
        Ok(())
    }
}

/// Rejects empty keys.
fn check_key(key: &[u8]) -> Result<(), DbError> {
    if key.is_empty() {
        debug!("rejected empty key");
        return Err(DbError::EmptyKey);
    }
    Ok(())
}

impl Drop for Db {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = self.engine.close() {
            error!("close on drop failed: {e}");
        }
    }
}
