//! Storage provider registry.
//!
//! Factories are tried in registration order; the first whose `supported`
//! accepts a URI opens it.

use crate::backends::{FilesystemFactory, MemoryFactory};
use crate::error::{StorageError, StorageResult};
use crate::traits::{StorageFactory, StorageProvider};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Name under which the filesystem factory is registered by default.
pub const LOCAL_PROVIDER: &str = "local";

/// Name under which the memory factory is registered by default.
pub const MEMORY_PROVIDER: &str = "memory";

/// Registered storage factories, keyed by unique name.
#[derive(Default)]
pub struct StorageRegistry {
    factories: RwLock<Vec<(String, Arc<dyn StorageFactory>)>>,
}

impl StorageRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in memory and filesystem factories.
    ///
    /// Memory is registered first so `memory://` never falls through to the
    /// filesystem.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        let defaults: [(&str, Arc<dyn StorageFactory>); 2] = [
            (MEMORY_PROVIDER, Arc::new(MemoryFactory::new())),
            (LOCAL_PROVIDER, Arc::new(FilesystemFactory)),
        ];
        for (name, factory) in defaults {
            registry.insert(name, factory);
        }
        registry
    }

    /// Register a factory under a unique, non-empty name.
    pub fn register(
        &self,
        name: impl Into<String>,
        factory: Arc<dyn StorageFactory>,
    ) -> StorageResult<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(StorageError::Config(
                "storage provider name must not be empty".to_string(),
            ));
        }
        let mut factories = self.factories.write().unwrap_or_else(PoisonError::into_inner);
        if factories.iter().any(|(existing, _)| *existing == name) {
            return Err(StorageError::Config(format!(
                "storage provider already registered: {name}"
            )));
        }
        debug!(provider = %name, "registered storage provider");
        factories.push((name, factory));
        Ok(())
    }

    fn insert(&self, name: &str, factory: Arc<dyn StorageFactory>) {
        self.factories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name.to_string(), factory));
    }

    /// Registered names in resolution order.
    pub fn names(&self) -> Vec<String> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Name of the factory that would open the URI.
    pub fn resolve(&self, uri: &str) -> Option<String> {
        self.find(uri).map(|(name, _)| name)
    }

    fn find(&self, uri: &str) -> Option<(String, Arc<dyn StorageFactory>)> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(_, factory)| factory.supported(uri))
            .map(|(name, factory)| (name.clone(), factory.clone()))
    }

    /// Open a provider with the first factory that supports the URI.
    pub async fn open(&self, uri: &str) -> StorageResult<Arc<dyn StorageProvider>> {
        let (name, factory) = self
            .find(uri)
            .ok_or_else(|| StorageError::NotSupported(uri.to_string()))?;
        debug!(provider = %name, uri, "opening storage");
        factory.open(uri).await
    }
}
