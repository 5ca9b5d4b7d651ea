//! # Key Index
//!
//! The index maps every live key to the [`RecordPos`] of its most recent
//! record. It is the only in-memory state the engine rebuilds on startup.
//!
//! The engine talks to the index exclusively through the [`Indexer`] trait,
//! so the backing structure can be swapped through configuration:
//!
//! - [`BTreeIndex`] — `BTreeMap` behind a `RwLock`.
//! - [`SkipListIndex`] — lock-free `crossbeam_skiplist::SkipMap`.
//!
//! Both order keys byte-wise lexicographically. Deleted keys are removed
//! outright; the index never holds tombstones.
//!
//! Key validation (e.g. rejecting empty keys) is the caller's job. At this
//! layer an empty key is just another key.


mod btree;
mod skiplist;

pub use btree::BTreeIndex;
pub use skiplist::SkipListIndex;

use crate::record::RecordPos;

/// Capability contract of a key index.
pub trait Indexer: Send + Sync {
    /// Inserts or replaces the position of `key`.
    ///
    /// Returns `false` if the backing structure could not be updated.
    fn put(&self, key: Vec<u8>, pos: RecordPos) -> bool;

    /// Position of the latest record for `key`, if the key is live.
    fn get(&self, key: &[u8]) -> Option<RecordPos>;

    /// Removes `key`. Returns `false` when the key was not present.
    fn delete(&self, key: &[u8]) -> bool;

    /// Number of live keys.
    fn len(&self) -> usize;

    /// True when no key is live.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Selects the index backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexType {
    /// Ordered B-tree under a readers-writer lock.
    #[default]
    BTree,

    /// Concurrent skip list.
    SkipList,
}

/// Builds an empty index of the requested type.
pub fn new_indexer(index_type: IndexType) -> Box<dyn Indexer> {
    match index_type {
        IndexType::BTree => Box::new(BTreeIndex::new()),
        IndexType::SkipList => Box::new(SkipListIndex::new()),
    }
}
