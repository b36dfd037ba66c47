use bytes::Bytes;
use depot_storage::{FilesystemBackend, MemoryBackend, StorageProvider};
use std::sync::Arc;
use tempfile::TempDir;

/// Generate deterministic test data using a seeded pseudo-random generator.
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;

    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    Bytes::from(data)
}

/// Every built-in backend, with the temp dir kept alive alongside.
pub async fn all_backends() -> Vec<(Arc<dyn StorageProvider>, Option<TempDir>)> {
    let dir = tempfile::tempdir().unwrap();
    let fs = FilesystemBackend::new(dir.path()).await.unwrap();
    vec![
        (Arc::new(fs), Some(dir)),
        (Arc::new(MemoryBackend::new("contract")), None),
    ]
}
