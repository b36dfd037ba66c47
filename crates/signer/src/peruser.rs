//! One RSA keypair per namespace, stored next to the namespace's repositories.

use crate::error::{SignerError, SignerResult};
use crate::key::{DEFAULT_KEY_BITS, KeyPair, SecretKey};
use crate::manager::{KeyManager, KeyManagerFactory};
use crate::signer;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use depot_core::NamespaceId;
use depot_storage::StorageProvider;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, instrument, warn};

pub const PERUSER_MODE: &str = "peruser";
pub const PERUSER_DESCRIPTION: &str = "each namespace has its own private/public key pair";

/// Whether a key was already present or had to be created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyOrigin {
    Existing,
    Generated,
}

/// Stores `priv_key.pem` and `pub_key.pem` under each namespace prefix.
pub struct PerNamespaceKeyManager {
    store: Arc<dyn StorageProvider>,
    key_bits: usize,
    // Per namespace, so concurrent first uses agree on one pair.
    generation: DashMap<String, Arc<Mutex<()>>>,
}

impl PerNamespaceKeyManager {
    pub fn new(store: Arc<dyn StorageProvider>) -> Self {
        Self {
            store,
            key_bits: DEFAULT_KEY_BITS,
            generation: DashMap::new(),
        }
    }

    /// Override the modulus size of generated keys.
    pub fn with_key_bits(mut self, bits: usize) -> Self {
        self.key_bits = bits;
        self
    }

    async fn lock_generation(&self, namespace: &NamespaceId) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.generation.entry(namespace.prefix()).or_default().value());
        lock.lock_owned().await
    }

    async fn write_pair(&self, namespace: &NamespaceId) -> SignerResult<()> {
        let bits = self.key_bits;
        let (private_pem, public_pem) = tokio::task::spawn_blocking(move || {
            KeyPair::generate(bits).and_then(|pair| pair.to_pem_pair())
        })
        .await
        .map_err(|e| SignerError::KeyGeneration(format!("key generation task failed: {e}")))??;

        let private_key = namespace.private_key_key();
        self.store
            .put(&private_key, Bytes::from(private_pem))
            .await?;

        if let Err(e) = self
            .store
            .put(&namespace.public_key_key(), Bytes::from(public_pem))
            .await
        {
            // Keys only exist in pairs.
            if let Err(cleanup) = self.store.delete(&private_key).await {
                warn!(namespace = %namespace, error = %cleanup, "failed to remove orphaned private key");
            }
            return Err(e.into());
        }

        info!(namespace = %namespace, bits, "generated namespace keypair");
        Ok(())
    }

    /// Read a key half, generating the pair first if it does not exist.
    async fn get_or_create(
        &self,
        namespace: &NamespaceId,
        key: &str,
    ) -> SignerResult<(Bytes, KeyOrigin)> {
        match self.store.get(key).await {
            Ok(content) => return Ok((content, KeyOrigin::Existing)),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let _guard = self.lock_generation(namespace).await;
        match self.store.get(key).await {
            Ok(content) => Ok((content, KeyOrigin::Existing)),
            Err(e) if e.is_not_found() => {
                self.write_pair(namespace).await?;
                Ok((self.store.get(key).await?, KeyOrigin::Generated))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Public key of the namespace and whether this call created it.
    pub async fn public_key_with_origin(
        &self,
        namespace: &NamespaceId,
    ) -> SignerResult<(Bytes, KeyOrigin)> {
        namespace
            .validate()
            .map_err(|e| SignerError::Config(e.to_string()))?;
        self.get_or_create(namespace, &namespace.public_key_key())
            .await
    }
}

#[async_trait]
impl KeyManager for PerNamespaceKeyManager {
    fn mode_name(&self) -> &'static str {
        PERUSER_MODE
    }

    fn description(&self) -> &'static str {
        PERUSER_DESCRIPTION
    }

    #[instrument(skip(self, namespace), fields(namespace = %namespace))]
    async fn generate_key(&self, namespace: &NamespaceId) -> SignerResult<()> {
        namespace
            .validate()
            .map_err(|e| SignerError::Config(e.to_string()))?;
        let _guard = self.lock_generation(namespace).await;
        self.write_pair(namespace).await
    }

    async fn public_key(&self, namespace: &NamespaceId) -> SignerResult<Bytes> {
        Ok(self.public_key_with_origin(namespace).await?.0)
    }

    #[instrument(skip(self, namespace, data), fields(namespace = %namespace, size = data.len()))]
    async fn sign(&self, namespace: &NamespaceId, data: &[u8]) -> SignerResult<Vec<u8>> {
        namespace
            .validate()
            .map_err(|e| SignerError::Config(e.to_string()))?;
        let (private_pem, _) = self
            .get_or_create(namespace, &namespace.private_key_key())
            .await?;
        signer::sign_sha256_pem(&private_pem, data)
    }

    #[instrument(skip(self, namespace, data), fields(namespace = %namespace, size = data.len()))]
    async fn decrypt(&self, namespace: &NamespaceId, data: &[u8]) -> SignerResult<Vec<u8>> {
        let private_pem = match self.store.get(&namespace.private_key_key()).await {
            Ok(content) => content,
            Err(e) if e.is_not_found() => {
                return Err(SignerError::KeyNotFound(namespace.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        signer::decrypt(&SecretKey::from_pem_bytes(&private_pem)?, data)
    }
}

/// Factory registered under [`PERUSER_MODE`].
#[derive(Debug, Clone)]
pub struct PerNamespaceFactory {
    key_bits: usize,
}

impl PerNamespaceFactory {
    pub fn new() -> Self {
        Self {
            key_bits: DEFAULT_KEY_BITS,
        }
    }

    pub fn with_key_bits(bits: usize) -> Self {
        Self { key_bits: bits }
    }
}

impl Default for PerNamespaceFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyManagerFactory for PerNamespaceFactory {
    fn mode_name(&self) -> &'static str {
        PERUSER_MODE
    }

    fn description(&self) -> &'static str {
        PERUSER_DESCRIPTION
    }

    async fn open(&self, store: Arc<dyn StorageProvider>) -> SignerResult<Arc<dyn KeyManager>> {
        Ok(Arc::new(
            PerNamespaceKeyManager::new(store).with_key_bits(self.key_bits),
        ))
    }
}
