//! In-process memory storage backend.
//!
//! Stores opened through [`MemoryFactory`] with the same `memory://name` URI
//! share their contents, so a key manager and an update service configured
//! with the same URI see the same objects.

use crate::error::{StorageError, StorageResult};
use crate::traits::{StorageFactory, StorageProvider};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::instrument;

/// URI scheme of memory stores.
pub const MEMORY_SCHEME: &str = "memory://";

/// Objects kept in a sorted map.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    name: String,
    objects: RwLock<BTreeMap<String, Bytes>>,
}

impl MemoryBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: RwLock::default(),
        }
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StorageProvider for MemoryBackend {
    #[instrument(skip(self), fields(backend = "memory"))]
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    #[instrument(skip(self, data), fields(backend = "memory", size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<String> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".to_string()));
        }
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), data);
        Ok(format!("{MEMORY_SCHEME}{}/{key}", self.name))
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key))
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let dir = prefix.trim_end_matches('/');
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        if dir.is_empty() {
            return Ok(objects.keys().cloned().collect());
        }
        let dir = format!("{dir}/");
        Ok(objects
            .range(dir.clone()..)
            .take_while(|(key, _)| key.starts_with(&dir))
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Opens named [`MemoryBackend`]s for `memory://name` URIs.
#[derive(Debug, Default)]
pub struct MemoryFactory {
    stores: Mutex<HashMap<String, Arc<MemoryBackend>>>,
}

impl MemoryFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageFactory for MemoryFactory {
    fn supported(&self, uri: &str) -> bool {
        uri.starts_with(MEMORY_SCHEME)
    }

    async fn open(&self, uri: &str) -> StorageResult<Arc<dyn StorageProvider>> {
        let name = uri
            .strip_prefix(MEMORY_SCHEME)
            .ok_or_else(|| StorageError::NotSupported(uri.to_string()))?;
        let mut stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);
        let store = stores
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryBackend::new(name)))
            .clone();
        Ok(store)
    }
}
