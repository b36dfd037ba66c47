//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// A key/value blob store addressed by slash-joined keys.
#[async_trait]
pub trait StorageProvider: Send + Sync + 'static {
    /// Get an object's content.
    ///
    /// Returns [`StorageError::NotFound`](crate::StorageError::NotFound) when
    /// the key is absent, distinct from I/O failures.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Store an object, replacing any previous content.
    ///
    /// Returns the backend location of the stored object.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<String>;

    /// Delete an object. Deleting a missing key is an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Check if an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// List object keys under a prefix, sorted.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Static identifier of the backend type, for logging.
    fn backend_name(&self) -> &'static str;
}

/// Constructs providers for the URIs it recognizes.
#[async_trait]
pub trait StorageFactory: Send + Sync + 'static {
    /// Whether this factory handles the URI.
    fn supported(&self, uri: &str) -> bool;

    /// Open a provider for the URI.
    async fn open(&self, uri: &str) -> StorageResult<Arc<dyn StorageProvider>>;
}
