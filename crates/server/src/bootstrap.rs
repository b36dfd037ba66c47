//! Building the application state from configuration.

use crate::state::AppState;
use anyhow::{Context, Result};
use depot_core::config::AppConfig;
use depot_signer::KeyManagerRegistry;
use depot_storage::StorageRegistry;

/// Open the configured blob store and key manager.
///
/// Without a `[key_manager]` section manifests are stored unsigned.
pub async fn build_state(
    config: AppConfig,
    storage: &StorageRegistry,
    key_managers: &KeyManagerRegistry,
) -> Result<AppState> {
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid configuration")?;

    let provider = storage.resolve(&config.storage.uri).with_context(|| {
        format!(
            "no storage provider supports {} (registered: {})",
            config.storage.uri,
            storage.names().join(", ")
        )
    })?;
    let store = depot_storage::from_config(storage, &config.storage)
        .await
        .context("failed to initialize storage")?;
    tracing::info!(
        uri = %config.storage.uri,
        provider = %provider,
        backend = store.backend_name(),
        "Storage backend initialized"
    );

    let key_manager =
        depot_signer::from_config(key_managers, storage, config.key_manager.as_ref())
            .await
            .context("failed to initialize key manager")?;
    match &key_manager {
        Some(km) => tracing::info!(mode = km.mode_name(), "Key manager initialized"),
        None => tracing::warn!("No key manager configured, manifests will be unsigned"),
    }

    Ok(AppState::new(config, store, key_manager))
}

/// Log blobs that no manifest names. Returns how many were found.
pub async fn report_orphans(state: &AppState) -> Result<usize> {
    let report = state
        .repos
        .orphaned_artifacts()
        .await
        .context("failed to audit stored repositories")?;
    let mut total = 0;
    for (repo, names) in &report {
        total += names.len();
        tracing::warn!(repo = %repo, orphans = ?names, "Blobs without a manifest entry");
    }
    Ok(total)
}
