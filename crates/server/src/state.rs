//! Application state shared across handlers.

use depot_core::config::AppConfig;
use depot_metadata::Repositories;
use depot_signer::KeyManager;
use depot_storage::StorageProvider;
use std::sync::Arc;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// Update services over the blob store, sharing the manifest locks.
    pub repos: Repositories,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn StorageProvider>,
        key_manager: Option<Arc<dyn KeyManager>>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            repos: Repositories::new(store, key_manager),
        }
    }

    pub fn store(&self) -> &Arc<dyn StorageProvider> {
        self.repos.store()
    }

    pub fn key_manager(&self) -> Option<&Arc<dyn KeyManager>> {
        self.repos.key_manager()
    }
}
