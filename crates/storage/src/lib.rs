//! Blob storage providers for depot.
//!
//! This crate provides:
//! - The [`StorageProvider`] trait: get, put, delete, exists and list over
//!   slash-joined keys
//! - A [`StorageRegistry`] that opens providers by URI
//! - Backends: local filesystem (bare paths, `file://`) and memory (`memory://`)

pub mod backends;
pub mod error;
pub mod registry;
pub mod traits;

pub use backends::{FilesystemBackend, FilesystemFactory, MemoryBackend, MemoryFactory};
pub use error::{StorageError, StorageResult};
pub use registry::StorageRegistry;
pub use traits::{StorageFactory, StorageProvider};

use depot_core::config::StorageConfig;
use std::sync::Arc;

/// Open the configured storage through a registry.
pub async fn from_config(
    registry: &StorageRegistry,
    config: &StorageConfig,
) -> StorageResult<Arc<dyn StorageProvider>> {
    config.validate().map_err(StorageError::Config)?;
    registry.open(&config.uri).await
}
