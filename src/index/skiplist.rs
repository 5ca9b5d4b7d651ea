//! Skip-list-backed index.

use crossbeam_skiplist::SkipMap;

use super::Indexer;
use crate::record::RecordPos;

/// Lock-free ordered index over a `crossbeam_skiplist::SkipMap`.
#[derive(Default)]
pub struct SkipListIndex {
    map: SkipMap<Vec<u8>, RecordPos>,
}

impl std::fmt::Debug for SkipListIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkipListIndex")
            .field("len", &self.map.len())
            .finish()
    }
}

impl SkipListIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Indexer for SkipListIndex {
    fn put(&self, key: Vec<u8>, pos: RecordPos) -> bool {
        self.map.insert(key, pos);
        true
    }

    fn get(&self, key: &[u8]) -> Option<RecordPos> {
        self.map.get(key).map(|entry| *entry.value())
    }

    fn delete(&self, key: &[u8]) -> bool {
        self.map.remove(key).is_some()
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}
