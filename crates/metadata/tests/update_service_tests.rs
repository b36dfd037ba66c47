//! Update service behaviour against real storage and key managers.

use async_trait::async_trait;
use bytes::Bytes;
use depot_core::{ArtifactEntry, Manifest, NamespaceId, RepoId};
use depot_metadata::{MetadataError, Repositories, SignatureStatus, UpdateService};
use depot_signer::{KeyManager, PerNamespaceKeyManager, SignerError, SignerResult, verify_sha256};
use depot_storage::{
    FilesystemBackend, MemoryBackend, StorageError, StorageProvider, StorageResult,
};
use std::sync::Arc;

fn widgets() -> RepoId {
    RepoId::app_v1("acme", "widgets")
}

fn entry(name: &str, hash: &str) -> ArtifactEntry {
    ArtifactEntry::new(name, vec![hash.to_string()]).unwrap()
}

fn key_manager(store: Arc<dyn StorageProvider>) -> Arc<dyn KeyManager> {
    Arc::new(PerNamespaceKeyManager::new(store).with_key_bits(1024))
}

/// A key manager whose signing always fails.
struct BrokenKeyManager;

#[async_trait]
impl KeyManager for BrokenKeyManager {
    fn mode_name(&self) -> &'static str {
        "broken"
    }
    fn description(&self) -> &'static str {
        "always fails"
    }
    async fn generate_key(&self, _namespace: &NamespaceId) -> SignerResult<()> {
        Err(SignerError::KeyGeneration("broken".to_string()))
    }
    async fn public_key(&self, namespace: &NamespaceId) -> SignerResult<Bytes> {
        Err(SignerError::KeyNotFound(namespace.to_string()))
    }
    async fn sign(&self, _namespace: &NamespaceId, _data: &[u8]) -> SignerResult<Vec<u8>> {
        Err(SignerError::Signing("hsm offline".to_string()))
    }
    async fn decrypt(&self, namespace: &NamespaceId, _data: &[u8]) -> SignerResult<Vec<u8>> {
        Err(SignerError::KeyNotFound(namespace.to_string()))
    }
}

/// Storage that refuses to write manifests once armed.
struct ManifestWriteFails {
    inner: MemoryBackend,
    armed: std::sync::atomic::AtomicBool,
}

#[async_trait]
impl StorageProvider for ManifestWriteFails {
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.inner.get(key).await
    }
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<String> {
        if key.ends_with("meta.json") && self.armed.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other("read-only")));
        }
        self.inner.put(key, data).await
    }
    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.inner.list(prefix).await
    }
    fn backend_name(&self) -> &'static str {
        "manifest-write-fails"
    }
}

#[tokio::test]
async fn opening_twice_yields_identical_items() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn StorageProvider> = Arc::new(FilesystemBackend::new(dir.path()).await.unwrap());

    let mut first = UpdateService::open(store.clone(), None, widgets()).await.unwrap();
    first.put(entry("a", "1")).await.unwrap();
    first.put(entry("b", "2")).await.unwrap();

    let second = UpdateService::open(store.clone(), None, widgets()).await.unwrap();
    let third = UpdateService::open(store, None, widgets()).await.unwrap();
    assert_eq!(second.list(), vec!["a", "b"]);
    assert_eq!(second.manifest().items, third.manifest().items);
    assert_eq!(
        second.get("b").unwrap().content_hashes,
        third.get("b").unwrap().content_hashes
    );
}

#[tokio::test]
async fn reput_replaces_hashes_and_keeps_count() {
    let store: Arc<dyn StorageProvider> = Arc::new(MemoryBackend::new("reput"));
    let mut service = UpdateService::open(store.clone(), None, widgets()).await.unwrap();

    service.put(entry("fn", "sha0")).await.unwrap();
    service.put(entry("other", "x")).await.unwrap();
    service.put(entry("fn", "sha0-updated")).await.unwrap();

    let reloaded = UpdateService::open(store, None, widgets()).await.unwrap();
    assert_eq!(reloaded.list(), vec!["fn", "other"]);
    assert_eq!(reloaded.get("fn").unwrap().content_hashes, vec!["sha0-updated"]);
}

#[tokio::test]
async fn delete_removes_exactly_one_and_absent_errors() {
    let store: Arc<dyn StorageProvider> = Arc::new(MemoryBackend::new("delete"));
    let mut service = UpdateService::open(store.clone(), None, widgets()).await.unwrap();
    service.put(entry("a", "1")).await.unwrap();
    service.put(entry("b", "2")).await.unwrap();

    service.delete("a").await.unwrap();
    assert_eq!(service.list(), vec!["b"]);

    let before = service.meta().await.unwrap();
    assert!(service.delete("a").await.unwrap_err().is_not_found());
    assert_eq!(service.list(), vec!["b"]);
    assert_eq!(service.meta().await.unwrap(), before);
}

#[tokio::test]
async fn unsigned_repository_scenario() {
    let store: Arc<dyn StorageProvider> = Arc::new(MemoryBackend::new("unsigned"));
    let mut service = UpdateService::open(store, None, widgets()).await.unwrap();

    let outcome = service
        .put(entry("linux-amd64-widget:latest", "deadbeef"))
        .await
        .unwrap();
    assert_eq!(outcome.signature, SignatureStatus::Unsigned);
    assert!(outcome.clone().require_signed().is_err());

    let manifest = Manifest::from_bytes(&service.meta().await.unwrap()).unwrap();
    assert_eq!(manifest.repo_id(), widgets());
    assert_eq!(manifest.items.len(), 1);
    assert_eq!(manifest.items[0].full_name, "linux-amd64-widget:latest");
    assert_eq!(manifest.items[0].content_hashes, vec!["deadbeef"]);

    match service.meta_signature().await {
        Err(MetadataError::NotFound(_)) => {}
        other => panic!("expected not found, got {other:?}"),
    }
}

#[tokio::test]
async fn signed_manifest_verifies_against_namespace_key() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn StorageProvider> = Arc::new(FilesystemBackend::new(dir.path()).await.unwrap());
    let km = key_manager(store.clone());

    let mut service = UpdateService::open(store.clone(), Some(km.clone()), widgets())
        .await
        .unwrap();
    let outcome = service.put(entry("widget", "aa")).await.unwrap();
    assert!(outcome.is_signed());

    let meta = service.meta().await.unwrap();
    let signature = service.meta_signature().await.unwrap();
    let public = km.public_key(&widgets().namespace_id()).await.unwrap();
    verify_sha256(&public, &meta, &signature).unwrap();

    let mut tampered = meta.to_vec();
    let last = tampered.len() - 2;
    tampered[last] ^= 0x01;
    assert!(verify_sha256(&public, &tampered, &signature).is_err());

    assert!(dir.path().join("app/v1/acme/pub_key.pem").is_file());
    assert!(dir.path().join("app/v1/acme/widgets/meta.sign").is_file());
}

#[tokio::test]
async fn signing_failure_does_not_fail_the_write() {
    let store: Arc<dyn StorageProvider> = Arc::new(MemoryBackend::new("broken-km"));
    let mut service = UpdateService::open(store.clone(), Some(Arc::new(BrokenKeyManager)), widgets())
        .await
        .unwrap();

    let outcome = service.put(entry("widget", "aa")).await.unwrap();
    match &outcome.signature {
        SignatureStatus::Failed(reason) => assert!(reason.contains("hsm offline")),
        other => panic!("expected failed signature, got {other:?}"),
    }
    assert!(matches!(
        outcome.require_signed(),
        Err(MetadataError::SigningFailed(_))
    ));

    let reloaded = UpdateService::open(store, None, widgets()).await.unwrap();
    assert_eq!(reloaded.list(), vec!["widget"]);
}

#[tokio::test]
async fn failed_manifest_save_removes_uploaded_blob() {
    let store = Arc::new(ManifestWriteFails {
        inner: MemoryBackend::new("fails"),
        armed: std::sync::atomic::AtomicBool::new(false),
    });
    let mut service = UpdateService::open(store.clone(), None, widgets()).await.unwrap();
    store.armed.store(true, std::sync::atomic::Ordering::SeqCst);

    assert!(matches!(
        service.put_artifact("widget", Bytes::from("data"), None).await,
        Err(MetadataError::Storage(_))
    ));
    assert!(!store.exists("app/v1/acme/widgets/widget").await.unwrap());
    assert!(service.list().is_empty());
}

#[tokio::test]
async fn failed_manifest_save_on_reupload_keeps_published_blob() {
    let store = Arc::new(ManifestWriteFails {
        inner: MemoryBackend::new("fails-reupload"),
        armed: std::sync::atomic::AtomicBool::new(false),
    });
    let mut service = UpdateService::open(store.clone(), None, widgets()).await.unwrap();
    let published = service
        .put_artifact("widget", Bytes::from("v1"), None)
        .await
        .unwrap();
    store.armed.store(true, std::sync::atomic::Ordering::SeqCst);

    assert!(matches!(
        service.put_artifact("widget", Bytes::from("v2"), None).await,
        Err(MetadataError::Storage(_))
    ));
    assert_eq!(service.list(), vec!["widget"]);
    assert_eq!(
        service.get("widget").unwrap().content_hashes,
        published.entry.content_hashes
    );
    assert_eq!(service.artifact("widget").await.unwrap(), Bytes::from("v1"));
}

#[tokio::test]
async fn repositories_are_isolated() {
    let store: Arc<dyn StorageProvider> = Arc::new(MemoryBackend::new("isolated"));
    let mut widgets_service = UpdateService::open(store.clone(), None, widgets()).await.unwrap();
    let gadgets_service =
        UpdateService::open(store, None, RepoId::app_v1("acme", "gadgets")).await.unwrap();

    widgets_service.put(entry("widget", "aa")).await.unwrap();
    assert!(gadgets_service.list().is_empty());
    assert!(gadgets_service.get("widget").unwrap_err().is_not_found());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_uploads_through_repositories_all_land() {
    let store: Arc<dyn StorageProvider> = Arc::new(MemoryBackend::new("concurrent"));
    let repos = Repositories::new(store.clone(), Some(key_manager(store.clone())));

    let uploads = (0..16).map(|i| {
        let repos = repos.clone();
        async move {
            let mut service = repos.open(widgets()).await?;
            let name = format!("widget-{i}");
            service
                .put_artifact(&name, Bytes::from(format!("payload {i}")), None)
                .await
        }
    });
    for result in futures::future::join_all(uploads).await {
        assert!(result.unwrap().outcome.is_signed());
    }

    let service = UpdateService::open(store.clone(), None, widgets()).await.unwrap();
    assert_eq!(service.list().len(), 16);

    let meta = service.meta().await.unwrap();
    let signature = service.meta_signature().await.unwrap();
    let public_key = store.get("app/v1/acme/pub_key.pem").await.unwrap();
    verify_sha256(&public_key, &meta, &signature).unwrap();
}

#[tokio::test]
async fn orphan_audit_covers_every_stored_repository() {
    let store: Arc<dyn StorageProvider> = Arc::new(MemoryBackend::new("audit"));
    let repos = Repositories::new(store.clone(), None);

    repos
        .open(widgets())
        .await
        .unwrap()
        .put_artifact("widget", Bytes::from("w"), None)
        .await
        .unwrap();
    repos.open(RepoId::app_v1("acme", "gadgets")).await.unwrap();
    store
        .put("app/v1/acme/gadgets/stray", Bytes::from("s"))
        .await
        .unwrap();

    let mut stored = repos.stored().await.unwrap();
    stored.sort_by_key(|repo| repo.to_string());
    assert_eq!(
        stored,
        vec![RepoId::app_v1("acme", "gadgets"), widgets()]
    );
    assert_eq!(
        repos.orphaned_artifacts().await.unwrap(),
        vec![(RepoId::app_v1("acme", "gadgets"), vec!["stray".to_string()])]
    );
}
