//! The update service: owner of one repository's signed manifest.

use crate::error::{MetadataError, MetadataResult};
use crate::locks::ManifestLocks;
use crate::outcome::{SaveOutcome, SignatureStatus};
use bytes::Bytes;
use depot_core::repo::{META_FILE_NAME, META_SIGN_FILE_NAME};
use depot_core::{ArtifactEntry, ContentDigest, Manifest, RepoId};
use depot_signer::KeyManager;
use depot_storage::StorageProvider;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, instrument, warn};

/// A stored artifact and the manifest update that recorded it.
#[derive(Clone, Debug)]
pub struct ArtifactUpload {
    pub entry: ArtifactEntry,
    /// Backend location of the blob.
    pub location: String,
    /// Whether an entry with the same name was replaced.
    pub replaced: bool,
    pub outcome: SaveOutcome,
}

/// Manifest manager for one `proto/version/namespace/repository`.
///
/// Mutations build the next manifest, persist it, and only then replace the
/// in-memory copy, so a failed save leaves the service unchanged.
pub struct UpdateService {
    store: Arc<dyn StorageProvider>,
    key_manager: Option<Arc<dyn KeyManager>>,
    repo: RepoId,
    manifest: Manifest,
}

impl UpdateService {
    /// Load the manifest of `repo`, creating and persisting an empty one if
    /// none exists.
    #[instrument(skip(store, key_manager, repo), fields(repo = %repo))]
    pub async fn open(
        store: Arc<dyn StorageProvider>,
        key_manager: Option<Arc<dyn KeyManager>>,
        repo: RepoId,
    ) -> MetadataResult<Self> {
        repo.validate()?;

        let existing = match store.get(&repo.manifest_key()).await {
            Ok(data) => Some(Manifest::from_bytes(&data)?),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };

        if let Some(manifest) = existing {
            if manifest.repo_id() != repo {
                return Err(MetadataError::Validation(format!(
                    "manifest at {} describes {}",
                    repo.manifest_key(),
                    manifest.repo_id()
                )));
            }
            return Ok(Self {
                store,
                key_manager,
                repo,
                manifest,
            });
        }

        let mut service = Self {
            store,
            key_manager,
            manifest: Manifest::new(&repo),
            repo,
        };
        let outcome = service.save().await?;
        info!(location = %outcome.location, signature = ?outcome.signature, "created manifest");
        Ok(service)
    }

    pub fn repo(&self) -> &RepoId {
        &self.repo
    }

    /// The in-memory manifest as last loaded or saved.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Record an entry, replacing one with the same full name.
    pub async fn put(&mut self, entry: ArtifactEntry) -> MetadataResult<SaveOutcome> {
        entry.validate()?;
        let mut next = self.manifest.clone();
        next.upsert(entry);
        self.commit(next).await
    }

    /// Remove the entry with `full_name`.
    pub async fn delete(&mut self, full_name: &str) -> MetadataResult<SaveOutcome> {
        let mut next = self.manifest.clone();
        if next.remove(full_name).is_none() {
            return Err(MetadataError::NotFound(format!(
                "{full_name} in {}",
                self.repo
            )));
        }
        self.commit(next).await
    }

    /// Look up an entry.
    pub fn get(&self, full_name: &str) -> MetadataResult<&ArtifactEntry> {
        if full_name.is_empty() {
            return Err(MetadataError::Validation(
                "full name must not be empty".to_string(),
            ));
        }
        self.manifest
            .find(full_name)
            .ok_or_else(|| MetadataError::NotFound(format!("{full_name} in {}", self.repo)))
    }

    /// Full names in manifest order.
    pub fn list(&self) -> Vec<String> {
        self.manifest.names()
    }

    /// Stored manifest bytes, exactly as signed.
    pub async fn meta(&self) -> MetadataResult<Bytes> {
        self.read(&self.repo.manifest_key(), "manifest").await
    }

    /// Stored manifest signature bytes.
    pub async fn meta_signature(&self) -> MetadataResult<Bytes> {
        self.read(&self.repo.signature_key(), "manifest signature")
            .await
    }

    /// Stored artifact bytes.
    pub async fn artifact(&self, name: &str) -> MetadataResult<Bytes> {
        let key = self.repo.artifact_key(name)?;
        self.read(&key, "artifact").await
    }

    async fn read(&self, key: &str, what: &str) -> MetadataResult<Bytes> {
        match self.store.get(key).await {
            Ok(data) => Ok(data),
            Err(e) if e.is_not_found() => Err(MetadataError::NotFound(format!("{what} {key}"))),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist the current manifest, and its signature if a key manager is
    /// attached.
    pub async fn save(&mut self) -> MetadataResult<SaveOutcome> {
        self.commit(self.manifest.clone()).await
    }

    async fn commit(&mut self, mut next: Manifest) -> MetadataResult<SaveOutcome> {
        next.updated = OffsetDateTime::now_utc();
        let content = Bytes::from(next.to_bytes()?);
        let location = self
            .store
            .put(&self.repo.manifest_key(), content.clone())
            .await?;
        self.manifest = next;

        let signature = match &self.key_manager {
            None => SignatureStatus::Unsigned,
            Some(key_manager) => match self.sign(key_manager.as_ref(), &content).await {
                Ok(()) => SignatureStatus::Signed,
                Err(e) => {
                    warn!(repo = %self.repo, error = %e, "failed to sign manifest");
                    SignatureStatus::Failed(e.to_string())
                }
            },
        };

        debug!(repo = %self.repo, items = self.manifest.items.len(), signature = ?signature, "saved manifest");
        Ok(SaveOutcome {
            location,
            signature,
        })
    }

    async fn sign(&self, key_manager: &dyn KeyManager, content: &Bytes) -> MetadataResult<()> {
        let signature = key_manager
            .sign(&self.repo.namespace_id(), content)
            .await?;
        self.store
            .put(&self.repo.signature_key(), Bytes::from(signature))
            .await?;
        Ok(())
    }

    /// Store an artifact blob and record it in the manifest.
    ///
    /// A `declared` digest that disagrees with the content is rejected before
    /// anything is written. If the manifest cannot be saved, the key is put
    /// back the way it was: the previous blob is restored, or the new one is
    /// removed. Re-uploads keep the entry's creation time.
    #[instrument(skip(self, data, declared), fields(repo = %self.repo, size = data.len()))]
    pub async fn put_artifact(
        &mut self,
        name: &str,
        data: Bytes,
        declared: Option<&ContentDigest>,
    ) -> MetadataResult<ArtifactUpload> {
        let key = self.repo.artifact_key(name)?;
        let digest = ContentDigest::compute(&data);
        if let Some(declared) = declared
            && *declared != digest
        {
            return Err(MetadataError::HashMismatch {
                expected: declared.to_hex(),
                actual: digest.to_hex(),
            });
        }

        let previous_blob = match self.store.get(&key).await {
            Ok(existing) => Some(existing),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };
        let location = self.store.put(&key, data).await?;

        let mut entry = ArtifactEntry::new(name, vec![digest.to_hex()])?;
        let previous = self.manifest.find(name).map(|existing| existing.created);
        if let Some(created) = previous {
            entry.created = created;
        }

        match self.put(entry.clone()).await {
            Ok(outcome) => {
                info!(name, digest = %digest, replaced = previous.is_some(), "stored artifact");
                Ok(ArtifactUpload {
                    entry,
                    location,
                    replaced: previous.is_some(),
                    outcome,
                })
            }
            Err(e) => {
                self.roll_back_blob(name, &key, previous_blob).await;
                Err(e)
            }
        }
    }

    async fn roll_back_blob(&self, name: &str, key: &str, previous: Option<Bytes>) {
        match previous {
            Some(previous) => {
                if let Err(e) = self.store.put(key, previous).await {
                    warn!(name, error = %e, "failed to restore previous artifact after manifest error");
                }
            }
            None => {
                if let Err(e) = self.store.delete(key).await {
                    warn!(name, error = %e, "failed to remove artifact after manifest error");
                }
            }
        }
    }

    /// Remove an artifact's entry, then its blob.
    #[instrument(skip(self), fields(repo = %self.repo))]
    pub async fn delete_artifact(&mut self, name: &str) -> MetadataResult<SaveOutcome> {
        let key = self.repo.artifact_key(name)?;
        let outcome = self.delete(name).await?;
        match self.store.delete(&key).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => debug!(name, "artifact blob already absent"),
            Err(e) => warn!(name, error = %e, "failed to remove artifact blob"),
        }
        info!(name, "deleted artifact");
        Ok(outcome)
    }

    /// Blobs stored under the repository that no manifest entry names.
    pub async fn orphaned_artifacts(&self) -> MetadataResult<Vec<String>> {
        let prefix = format!("{}/", self.repo.prefix());
        let keys = self.store.list(&self.repo.prefix()).await?;
        Ok(keys
            .iter()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter(|name| !name.contains('/'))
            .filter(|name| *name != META_FILE_NAME && *name != META_SIGN_FILE_NAME)
            .filter(|name| self.manifest.find(name).is_none())
            .map(str::to_string)
            .collect())
    }
}

/// Opens update services that share a store, a key manager and write locks.
#[derive(Clone)]
pub struct Repositories {
    store: Arc<dyn StorageProvider>,
    key_manager: Option<Arc<dyn KeyManager>>,
    locks: ManifestLocks,
}

impl Repositories {
    pub fn new(store: Arc<dyn StorageProvider>, key_manager: Option<Arc<dyn KeyManager>>) -> Self {
        Self {
            store,
            key_manager,
            locks: ManifestLocks::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn StorageProvider> {
        &self.store
    }

    pub fn key_manager(&self) -> Option<&Arc<dyn KeyManager>> {
        self.key_manager.as_ref()
    }

    /// Repositories that have a stored manifest.
    pub async fn stored(&self) -> MetadataResult<Vec<RepoId>> {
        let keys = self.store.list("").await?;
        Ok(keys
            .iter()
            .filter_map(|key| RepoId::from_manifest_key(key))
            .collect())
    }

    /// Blobs no manifest entry names, for every stored repository that has
    /// any.
    ///
    /// They are left behind by uploads whose rollback failed and by writers
    /// in other processes.
    pub async fn orphaned_artifacts(&self) -> MetadataResult<Vec<(RepoId, Vec<String>)>> {
        let mut report = Vec::new();
        for repo in self.stored().await? {
            let orphans = self.open(repo.clone()).await?.orphaned_artifacts().await?;
            if !orphans.is_empty() {
                report.push((repo, orphans));
            }
        }
        Ok(report)
    }

    /// Open the update service of `repo`, holding its lock until the
    /// returned guard is dropped.
    ///
    /// Reads take the lock too, since opening a fresh repository writes.
    pub async fn open(&self, repo: RepoId) -> MetadataResult<LockedUpdateService> {
        repo.validate()?;
        let guard = self.locks.acquire(&repo).await;
        let service =
            UpdateService::open(self.store.clone(), self.key_manager.clone(), repo).await?;
        Ok(LockedUpdateService {
            service,
            _guard: guard,
        })
    }
}

/// An [`UpdateService`] with exclusive in-process access to its manifest.
pub struct LockedUpdateService {
    service: UpdateService,
    _guard: OwnedMutexGuard<()>,
}

impl Deref for LockedUpdateService {
    type Target = UpdateService;

    fn deref(&self) -> &UpdateService {
        &self.service
    }
}

impl DerefMut for LockedUpdateService {
    fn deref_mut(&mut self) -> &mut UpdateService {
        &mut self.service
    }
}
