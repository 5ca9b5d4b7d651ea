//! Put / get correctness tests.
//!
//! ## See also
//! - [`tests_delete`] — tombstones and delete errors
//! - [`tests_rotation`] — reads across retired segments

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use crate::engine::tests::helpers::*;
    use crate::engine::{Engine, EngineError};
    use crate::record::RecordPos;
    use tempfile::TempDir;

    /// # Scenario
    /// A freshly written key reads back its value.
    ///
    /// # Starting environment
    /// Empty directory — no segments yet.
    ///
    /// # Actions
    /// 1. Put `"hello"` = `"world"`.
    /// 2. Get `"hello"`.
    ///
    /// # Expected behavior
    /// Returns `"world"`; segment 0 was created lazily by the first write.
    #[test]
    fn single_segment__put_then_get() {
        let tmp = TempDir::new().unwrap();
        let engine = Engine::open(tmp.path(), default_config()).unwrap();
        assert_eq!(engine.stats().unwrap().active_file_id, None);

        engine.put(b"hello".to_vec(), b"world".to_vec()).unwrap();
        assert_eq!(engine.get(b"hello").unwrap(), b"world");

        let stats = engine.stats().unwrap();
        assert_eq!(stats.active_file_id, Some(0));
        assert_eq!(stats.file_ids, vec![0]);
        assert_eq!(stats.key_count, 1);
    }

    #[test]
    fn single_segment__get_missing_key() {
        let tmp = TempDir::new().unwrap();
        let engine = Engine::open(tmp.path(), default_config()).unwrap();
        assert!(matches!(
            engine.get(b"nope"),
            Err(EngineError::KeyNotFound)
        ));

        engine.put(b"a".to_vec(), b"1".to_vec()).unwrap();
        assert!(matches!(
            engine.get(b"b"),
            Err(EngineError::KeyNotFound)
        ));
    }

    /// # Scenario
    /// Overwrites keep only the newest value visible.
    ///
    /// # Actions
    /// 1. Put `"k"` three times with `"v1"`, `"v2"`, `"v3"`.
    ///
    /// # Expected behavior
    /// Get returns `"v3"` and the index holds one key pointing at the third
    /// record, which starts right after the first two.
    #[test]
    fn single_segment__overwrite_keeps_latest() {
        let tmp = TempDir::new().unwrap();
        let engine = Engine::open(tmp.path(), default_config()).unwrap();

        engine.put(b"k".to_vec(), b"v1".to_vec()).unwrap();
        engine.put(b"k".to_vec(), b"v2".to_vec()).unwrap();
        engine.put(b"k".to_vec(), b"v3".to_vec()).unwrap();

        assert_eq!(engine.get(b"k").unwrap(), b"v3");
        assert_eq!(engine.stats().unwrap().key_count, 1);

        // Each record: crc(4) + type(1) + 2 varints(2) + "k"(1) + "vN"(2) = 10.
        let snap = index_snapshot(&engine, &[b"k".to_vec()]);
        assert_eq!(
            snap[&b"k".to_vec()],
            Some(RecordPos {
                file_id: 0,
                offset: 20
            })
        );
    }

    #[test]
    fn single_segment__empty_value() {
        let tmp = TempDir::new().unwrap();
        let engine = Engine::open(tmp.path(), default_config()).unwrap();

        engine.put(b"k".to_vec(), Vec::new()).unwrap();
        assert_eq!(engine.get(b"k").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn single_segment__binary_keys_and_large_value() {
        let tmp = TempDir::new().unwrap();
        let engine = Engine::open(tmp.path(), default_config()).unwrap();

        let key = vec![0u8, 255, 1, 254];
        let value: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        engine.put(key.clone(), value.clone()).unwrap();
        engine.put(vec![0u8], b"short".to_vec()).unwrap();

        assert_eq!(engine.get(&key).unwrap(), value);
        assert_eq!(engine.get(&[0u8]).unwrap(), b"short");
    }

    #[test]
    fn single_segment__many_keys() {
        let tmp = TempDir::new().unwrap();
        let engine = Engine::open(tmp.path(), default_config()).unwrap();
        fill(&engine, 500);

        for i in 0..500 {
            assert_eq!(
                engine.get(format!("key_{i:04}").as_bytes()).unwrap(),
                format!("value_with_some_padding_{i:04}").into_bytes()
            );
        }
        assert_eq!(engine.stats().unwrap().key_count, 500);
    }

    /// Same workload against the skip-list index.
    #[test]
    fn skiplist_index__put_get_overwrite() {
        let tmp = TempDir::new().unwrap();
        let engine = Engine::open(tmp.path(), skiplist_config()).unwrap();
        fill(&engine, 100);
        engine.put(b"key_0042".to_vec(), b"new".to_vec()).unwrap();

        assert_eq!(engine.get(b"key_0042").unwrap(), b"new");
        assert_eq!(
            engine.get(b"key_0099").unwrap(),
            b"value_with_some_padding_0099"
        );
        assert_eq!(engine.stats().unwrap().key_count, 100);
    }

    #[test]
    fn sync_writes__every_put_is_durable() {
        let tmp = TempDir::new().unwrap();
        let config = crate::engine::EngineConfig {
            sync_writes: true,
            ..default_config()
        };
        let engine = Engine::open(tmp.path(), config).unwrap();
        engine.put(b"a".to_vec(), b"1".to_vec()).unwrap();
        assert_eq!(segment_len(tmp.path(), 0), engine.stats().unwrap().total_size_bytes);
        engine.sync().unwrap();
    }

    /// An index position whose segment is gone is reported as
    /// `FileNotFound`, never as a missing key.
    #[test]
    fn desync__position_in_unknown_segment() {
        let tmp = TempDir::new().unwrap();
        let engine = Engine::open(tmp.path(), default_config()).unwrap();
        engine.put(b"k".to_vec(), b"v".to_vec()).unwrap();

        {
            let inner = engine.lock().unwrap();
            inner.index.put(
                b"k".to_vec(),
                RecordPos {
                    file_id: 9,
                    offset: 0,
                },
            );
        }

        assert!(matches!(
            engine.get(b"k"),
            Err(EngineError::FileNotFound(9))
        ));
    }
}
