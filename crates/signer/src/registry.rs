//! Key manager registry.

use crate::error::{SignerError, SignerResult};
use crate::manager::{KeyManager, KeyManagerFactory};
use crate::peruser::PerNamespaceFactory;
use depot_core::config::KeyManagerConfig;
use depot_storage::StorageRegistry;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Registered key manager factories, keyed by unique mode name.
#[derive(Default)]
pub struct KeyManagerRegistry {
    factories: RwLock<Vec<(String, Arc<dyn KeyManagerFactory>)>>,
}

impl KeyManagerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the `peruser` mode.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        let factory = PerNamespaceFactory::new();
        registry
            .factories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((factory.mode_name().to_string(), Arc::new(factory)));
        registry
    }

    /// Register a factory under a unique, non-empty mode name.
    pub fn register(
        &self,
        name: impl Into<String>,
        factory: Arc<dyn KeyManagerFactory>,
    ) -> SignerResult<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SignerError::Config(
                "key manager name must not be empty".to_string(),
            ));
        }
        let mut factories = self.factories.write().unwrap_or_else(PoisonError::into_inner);
        if factories.iter().any(|(existing, _)| *existing == name) {
            return Err(SignerError::Config(format!(
                "key manager already registered: {name}"
            )));
        }
        debug!(mode = %name, "registered key manager");
        factories.push((name, factory));
        Ok(())
    }

    /// `(mode, description)` of every registered factory.
    pub fn modes(&self) -> Vec<(String, &'static str)> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, factory)| (name.clone(), factory.description()))
            .collect()
    }

    /// Open a key manager of `mode` keeping its keys in the storage at `uri`.
    pub async fn open(
        &self,
        mode: &str,
        uri: &str,
        storage: &StorageRegistry,
    ) -> SignerResult<Arc<dyn KeyManager>> {
        let factory = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(name, _)| name == mode)
            .map(|(_, factory)| factory.clone())
            .ok_or_else(|| SignerError::NotSupported(mode.to_string()))?;

        let store = storage.open(uri).await?;
        info!(mode, uri, backend = store.backend_name(), "opened key manager");
        factory.open(store).await
    }
}

/// Open the configured key manager, if any.
pub async fn from_config(
    registry: &KeyManagerRegistry,
    storage: &StorageRegistry,
    config: Option<&KeyManagerConfig>,
) -> SignerResult<Option<Arc<dyn KeyManager>>> {
    let Some(config) = config else {
        return Ok(None);
    };
    config.validate().map_err(SignerError::Config)?;
    registry
        .open(&config.mode, &config.uri, storage)
        .await
        .map(Some)
}
