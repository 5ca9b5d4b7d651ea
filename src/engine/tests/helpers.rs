use std::collections::BTreeMap;
use std::path::Path;

use tracing_subscriber::EnvFilter;

use crate::engine::{Engine, EngineConfig};
use crate::index::IndexType;
use crate::record::RecordPos;
use crate::segment::segment_file_path;

/// Initialize tracing subscriber controlled by `RUST_LOG` env var.
/// Safe to call multiple times — only the first call takes effect.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Default config: segments large enough that tests never rotate.
pub fn default_config() -> EngineConfig {
    init_tracing();
    EngineConfig {
        max_segment_size: 1024 * 1024,
        ..EngineConfig::default()
    }
}

/// 64-byte segments: almost every write rotates.
pub fn tiny_segment_config() -> EngineConfig {
    init_tracing();
    EngineConfig {
        max_segment_size: 64,
        ..EngineConfig::default()
    }
}

/// 1 KiB segments with the skip-list index.
pub fn skiplist_config() -> EngineConfig {
    init_tracing();
    EngineConfig {
        max_segment_size: 1024,
        index_type: IndexType::SkipList,
        ..EngineConfig::default()
    }
}

/// Reopen an engine with `config`.
pub fn reopen(path: &Path, config: EngineConfig) -> Engine {
    Engine::open(path, config).expect("reopen")
}

/// Writes `n` keys `key_0000..` with values `value_with_some_padding_0000..`.
pub fn fill(engine: &Engine, n: usize) {
    for i in 0..n {
        engine
            .put(
                format!("key_{i:04}").into_bytes(),
                format!("value_with_some_padding_{i:04}").into_bytes(),
            )
            .expect("put");
    }
}

/// Snapshot of the index as key → position, for comparing engine instances.
pub fn index_snapshot(engine: &Engine, keys: &[Vec<u8>]) -> BTreeMap<Vec<u8>, Option<RecordPos>> {
    let inner = engine.lock().unwrap();
    keys.iter()
        .map(|k| (k.clone(), inner.index.get(k)))
        .collect()
}

/// Size of segment `file_id` on disk.
pub fn segment_len(path: &Path, file_id: u32) -> u64 {
    std::fs::metadata(segment_file_path(path, file_id))
        .unwrap()
        .len()
}
