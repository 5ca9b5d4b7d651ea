//! `BTreeMap`-backed index.

use std::collections::BTreeMap;
use std::sync::RwLock;

use tracing::error;

use super::Indexer;
use crate::record::RecordPos;

/// Ordered index over a `BTreeMap`.
///
/// `BTreeMap` is not safe for concurrent mutation, so it lives behind its own
/// `RwLock`. A poisoned lock makes mutations report failure and lookups miss.
#[derive(Debug, Default)]
pub struct BTreeIndex {
    tree: RwLock<BTreeMap<Vec<u8>, RecordPos>>,
}

impl BTreeIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Indexer for BTreeIndex {
    fn put(&self, key: Vec<u8>, pos: RecordPos) -> bool {
        match self.tree.write() {
            Ok(mut tree) => {
                tree.insert(key, pos);
                true
            }
            Err(_) => {
                error!("index lock poisoned during put");
                false
            }
        }
    }

    fn get(&self, key: &[u8]) -> Option<RecordPos> {
        match self.tree.read() {
            Ok(tree) => tree.get(key).copied(),
            Err(_) => {
                error!("index lock poisoned during get");
                None
            }
        }
    }

    fn delete(&self, key: &[u8]) -> bool {
        match self.tree.write() {
            Ok(mut tree) => tree.remove(key).is_some(),
            Err(_) => {
                error!("index lock poisoned during delete");
                false
            }
        }
    }

    fn len(&self) -> usize {
        self.tree.read().map(|tree| tree.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod poison_tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn poisoned_lock_reports_failure() {
        let index = Arc::new(BTreeIndex::new());
        let pos = RecordPos {
            file_id: 0,
            offset: 0,
        };
        assert!(index.put(b"k".to_vec(), pos));

        let poisoner = Arc::clone(&index);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.tree.write().unwrap();
            panic!("poison the index lock");
        })
        .join();

        assert!(!index.put(b"k2".to_vec(), pos));
        assert!(!index.delete(b"k"));
        assert_eq!(index.get(b"k"), None);
    }
}
