//! Manifest sync, signature verification and verified downloads.
//!
//! A [`VerifiedManifest`] can only be obtained from [`Synchronizer::sync`] or
//! [`Synchronizer::load_cached`], both of which check the manifest signature
//! first. Downloads require one, so no artifact hash is ever trusted from an
//! unverified manifest.

use crate::error::{ClientError, ClientResult};
use crate::remote::{HttpRemote, RemoteRepository, UploadReceipt};
use crate::url::RepoUrl;
use bytes::Bytes;
use depot_core::{ArtifactEntry, ContentDigest, Manifest};
use depot_storage::StorageProvider;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A manifest whose signature verified against the namespace key.
#[derive(Clone, Debug)]
pub struct VerifiedManifest {
    manifest: Manifest,
    bytes: Bytes,
}

impl VerifiedManifest {
    /// Verify `signature` over `bytes`, then parse and check the identity.
    fn verify(
        url: &RepoUrl,
        bytes: Bytes,
        signature: &[u8],
        public_key: &[u8],
    ) -> ClientResult<Self> {
        depot_signer::verify_sha256(public_key, &bytes, signature)
            .map_err(|e| ClientError::SignatureMismatch(e.to_string()))?;

        let manifest = Manifest::from_bytes(&bytes)?;
        let expected = url.repo_id();
        if manifest.repo_id() != expected {
            return Err(ClientError::ManifestMismatch {
                expected: expected.to_string(),
                actual: manifest.repo_id().to_string(),
            });
        }
        Ok(Self { manifest, bytes })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// The exact bytes the signature covers.
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Artifact names in manifest order.
    pub fn names(&self) -> Vec<String> {
        self.manifest.names()
    }

    pub fn entry(&self, name: &str) -> ClientResult<&ArtifactEntry> {
        self.manifest
            .find(name)
            .ok_or_else(|| ClientError::NotInManifest(name.to_string()))
    }

    /// Declared hex SHA-512 of an artifact's first content part.
    pub fn expected_hash(&self, name: &str) -> ClientResult<&str> {
        self.entry(name)?
            .primary_hash()
            .ok_or_else(|| ClientError::NotInManifest(name.to_string()))
    }
}

/// An artifact whose content matched the verified manifest.
#[derive(Clone, Debug)]
pub struct PulledArtifact {
    pub name: String,
    /// Location of the cached copy.
    pub location: String,
    pub digest: ContentDigest,
    pub data: Bytes,
}

fn incomplete<E: Display>(stage: &'static str) -> impl Fn(E) -> ClientError {
    move |e| ClientError::SyncIncomplete {
        stage,
        reason: e.to_string(),
    }
}

/// Client side of one repository: a remote endpoint and a local cache.
pub struct Synchronizer {
    url: RepoUrl,
    remote: Arc<dyn RemoteRepository>,
    cache: Arc<dyn StorageProvider>,
}

impl Synchronizer {
    pub fn new(
        url: RepoUrl,
        remote: Arc<dyn RemoteRepository>,
        cache: Arc<dyn StorageProvider>,
    ) -> Self {
        Self { url, remote, cache }
    }

    /// A synchronizer talking HTTP to the server in `url`.
    pub fn http(
        url: RepoUrl,
        cache: Arc<dyn StorageProvider>,
        timeout: Option<Duration>,
    ) -> ClientResult<Self> {
        let remote = HttpRemote::with_timeout(url.clone(), timeout)?;
        Ok(Self::new(url, Arc::new(remote), cache))
    }

    pub fn url(&self) -> &RepoUrl {
        &self.url
    }

    /// Fetch and cache the manifest, its signature and the namespace key,
    /// then verify the signature.
    pub async fn sync(&self) -> ClientResult<VerifiedManifest> {
        let meta = self
            .remote
            .meta()
            .await
            .map_err(incomplete("fetch manifest"))?;
        self.cache
            .put(&self.url.manifest_cache_key(), meta.clone())
            .await
            .map_err(incomplete("cache manifest"))?;

        let signature = self
            .remote
            .meta_signature()
            .await
            .map_err(incomplete("fetch manifest signature"))?;
        self.cache
            .put(&self.url.signature_cache_key(), signature.clone())
            .await
            .map_err(incomplete("cache manifest signature"))?;

        let public_key = self
            .remote
            .public_key()
            .await
            .map_err(incomplete("fetch public key"))?;
        self.cache
            .put(&self.url.public_key_cache_key(), public_key.clone())
            .await
            .map_err(incomplete("cache public key"))?;

        let verified = VerifiedManifest::verify(&self.url, meta, &signature, &public_key)?;
        info!(repo = %self.url, items = verified.manifest.items.len(), "synced manifest");
        Ok(verified)
    }

    /// Re-verify the previously synced manifest without network access.
    pub async fn load_cached(&self) -> ClientResult<VerifiedManifest> {
        let meta = self.cache.get(&self.url.manifest_cache_key()).await?;
        let signature = self.cache.get(&self.url.signature_cache_key()).await?;
        let public_key = self.cache.get(&self.url.public_key_cache_key()).await?;
        VerifiedManifest::verify(&self.url, meta, &signature, &public_key)
    }

    /// Download an artifact listed in `verified` and check its hash.
    ///
    /// On mismatch the cached copy is removed and nothing is returned.
    pub async fn pull(
        &self,
        verified: &VerifiedManifest,
        name: &str,
    ) -> ClientResult<PulledArtifact> {
        let expected = verified.expected_hash(name)?.to_string();
        let key = self.url.blob_cache_key(name)?;

        let data = self.remote.blob(name).await?;
        let location = self.cache.put(&key, data.clone()).await?;

        let digest = ContentDigest::compute(&data);
        let actual = digest.to_hex();
        if !actual.eq_ignore_ascii_case(&expected) {
            if let Err(e) = self.cache.delete(&key).await {
                warn!(name, error = %e, "failed to remove corrupt download");
            }
            return Err(ClientError::HashMismatch {
                name: name.to_string(),
                expected,
                actual,
            });
        }

        debug!(name, location = %location, "verified artifact");
        Ok(PulledArtifact {
            name: name.to_string(),
            location,
            digest,
            data,
        })
    }

    /// Names the server lists, without verification.
    pub async fn remote_names(&self) -> ClientResult<Vec<String>> {
        self.remote.list().await
    }

    /// Upload an artifact with its SHA-512 digest.
    pub async fn push(&self, name: &str, data: Bytes) -> ClientResult<UploadReceipt> {
        depot_core::repo::validate_artifact_name(name)?;
        let digest = ContentDigest::compute(&data);
        let receipt = self.remote.put(name, data, &digest).await?;
        if receipt.digest != digest.to_hex() {
            return Err(ClientError::HashMismatch {
                name: name.to_string(),
                expected: digest.to_hex(),
                actual: receipt.digest,
            });
        }
        info!(repo = %self.url, name, signed = receipt.signed, "pushed artifact");
        Ok(receipt)
    }

    /// Remove an artifact from the remote repository.
    pub async fn remove(&self, name: &str) -> ClientResult<()> {
        self.remote.delete(name).await?;
        info!(repo = %self.url, name, "removed artifact");
        Ok(())
    }
}
