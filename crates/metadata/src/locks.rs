//! In-process serialization of manifest read-modify-write cycles.

use dashmap::DashMap;
use depot_core::RepoId;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per manifest key.
///
/// Only writers within this process are coordinated; processes sharing the
/// same storage still race, last writer wins.
#[derive(Clone, Default)]
pub struct ManifestLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl ManifestLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to the manifest of `repo`.
    pub async fn acquire(&self, repo: &RepoId) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.locks.entry(repo.manifest_key()).or_default().value());
        lock.lock_owned().await
    }

    /// Number of manifests that have been locked at least once.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_repo_is_exclusive() {
        let locks = ManifestLocks::new();
        let repo = RepoId::app_v1("acme", "widgets");

        let guard = locks.acquire(&repo).await;
        let contender = {
            let locks = locks.clone();
            let repo = repo.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&repo).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_repos_do_not_block() {
        let locks = ManifestLocks::new();
        let _widgets = locks.acquire(&RepoId::app_v1("acme", "widgets")).await;
        let _gadgets = locks.acquire(&RepoId::app_v1("acme", "gadgets")).await;
        assert_eq!(locks.len(), 2);
    }
}
