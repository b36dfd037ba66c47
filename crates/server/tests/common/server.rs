//! Server test utilities.

use depot_core::config::{AppConfig, StorageConfig};
use depot_signer::{KeyManager, PerNamespaceKeyManager};
use depot_server::{AppState, create_router};
use depot_storage::{FilesystemBackend, StorageProvider};
use std::sync::Arc;
use tempfile::TempDir;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub store: Arc<dyn StorageProvider>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// A server with filesystem storage and a `peruser` key manager.
    pub async fn new() -> Self {
        Self::build(true).await
    }

    /// A server that stores manifests unsigned.
    pub async fn unsigned() -> Self {
        Self::build(false).await
    }

    async fn build(signing: bool) -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let storage_path = temp_dir.path().join("storage");
        let store: Arc<dyn StorageProvider> = Arc::new(
            FilesystemBackend::new(&storage_path)
                .await
                .expect("Failed to create storage backend"),
        );

        let key_manager: Option<Arc<dyn KeyManager>> = if signing {
            let keys: Arc<dyn StorageProvider> = Arc::new(
                FilesystemBackend::new(temp_dir.path().join("keys"))
                    .await
                    .expect("Failed to create key storage"),
            );
            Some(Arc::new(
                PerNamespaceKeyManager::new(keys).with_key_bits(1024),
            ))
        } else {
            None
        };

        let config = AppConfig {
            storage: StorageConfig {
                uri: storage_path.display().to_string(),
            },
            ..Default::default()
        };

        let state = AppState::new(config, store.clone(), key_manager);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            store,
            _temp_dir: temp_dir,
        }
    }
}
