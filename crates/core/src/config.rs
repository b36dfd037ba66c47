//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};

/// Top-level server configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Manifest signing. Without it manifests are stored unsigned.
    #[serde(default)]
    pub key_manager: Option<KeyManagerConfig>,
}

impl AppConfig {
    /// Validate configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        self.storage.validate()?;
        if let Some(km) = &self.key_manager {
            km.validate()?;
        }
        Ok(())
    }
}

/// HTTP server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Blob storage configuration.
///
/// The URI selects the storage provider: a bare path or `file://` URI is
/// the local filesystem, `memory://name` is process memory.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_uri")]
    pub uri: String,
}

fn default_storage_uri() -> String {
    "./data/storage".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uri: default_storage_uri(),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.uri.trim().is_empty() {
            return Err("storage uri must not be empty".to_string());
        }
        Ok(())
    }
}

/// Key manager configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyManagerConfig {
    /// Registered key manager mode (e.g., "peruser").
    #[serde(default = "default_key_manager_mode")]
    pub mode: String,
    /// Storage URI where the key manager keeps its keys.
    pub uri: String,
}

fn default_key_manager_mode() -> String {
    "peruser".to_string()
}

impl KeyManagerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.mode.trim().is_empty() {
            return Err("key manager mode must not be empty".to_string());
        }
        if self.uri.trim().is_empty() {
            return Err("key manager uri must not be empty".to_string());
        }
        Ok(())
    }
}
