//! Key manager trait.

use crate::error::SignerResult;
use async_trait::async_trait;
use bytes::Bytes;
use depot_core::NamespaceId;
use depot_storage::StorageProvider;
use std::sync::Arc;

/// Holds signing keys on behalf of namespaces.
#[async_trait]
pub trait KeyManager: Send + Sync + 'static {
    /// Registered mode name (e.g., "peruser").
    fn mode_name(&self) -> &'static str;

    /// Human readable description of the mode.
    fn description(&self) -> &'static str;

    /// Generate and persist a fresh keypair, replacing any existing one.
    async fn generate_key(&self, namespace: &NamespaceId) -> SignerResult<()>;

    /// PEM public key of the namespace, created on first request.
    async fn public_key(&self, namespace: &NamespaceId) -> SignerResult<Bytes>;

    /// Sign `data` with the namespace key, created on first request.
    async fn sign(&self, namespace: &NamespaceId, data: &[u8]) -> SignerResult<Vec<u8>>;

    /// Decrypt with the namespace key. Fails if the key does not exist.
    async fn decrypt(&self, namespace: &NamespaceId, data: &[u8]) -> SignerResult<Vec<u8>>;
}

/// Creates key managers bound to a storage provider.
#[async_trait]
pub trait KeyManagerFactory: Send + Sync + 'static {
    fn mode_name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    async fn open(&self, store: Arc<dyn StorageProvider>) -> SignerResult<Arc<dyn KeyManager>>;
}
