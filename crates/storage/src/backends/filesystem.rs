//! Local filesystem storage backend.

use crate::error::{StorageError, StorageResult};
use crate::traits::{StorageFactory, StorageProvider};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// URI scheme accepted in addition to bare paths.
pub const FILE_SCHEME: &str = "file://";

/// Marker embedded in the names of in-flight writes.
const TEMP_MARKER: &str = ".tmp.";

/// Objects stored as files under a root directory.
///
/// Keys map to relative paths, so `app/v1/acme/widgets/meta.json` is a file
/// four directories below the root.
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend, creating the root if needed.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the full path for a key, with path traversal protection.
    ///
    /// `canonicalize` and `symlink_metadata` block, so validation runs on the
    /// blocking pool.
    async fn key_path(&self, key: &str) -> StorageResult<PathBuf> {
        let root = self.root.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || Self::key_path_sync(&root, &key))
            .await
            .map_err(|e| {
                StorageError::Io(std::io::Error::other(format!("spawn_blocking failed: {e}")))
            })?
    }

    /// Resolve a key below `root`, rejecting anything that would escape it,
    /// including through symlinks.
    fn key_path_sync(root: &Path, key: &str) -> StorageResult<PathBuf> {
        if key.starts_with('/') || key.starts_with('\\') {
            return Err(StorageError::InvalidKey(format!(
                "absolute keys are not allowed: {key}"
            )));
        }

        for component in Path::new(key).components() {
            if !matches!(component, Component::Normal(_)) {
                return Err(StorageError::InvalidKey(format!(
                    "contains unsafe path component: {key}"
                )));
            }
        }

        let path = root.join(key);

        let root_canonical = root.canonicalize().map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to canonicalize root: {e}"),
            ))
        })?;

        match std::fs::symlink_metadata(&path) {
            Ok(meta) => {
                let canonical = path.canonicalize().map_err(|e| {
                    if meta.file_type().is_symlink() {
                        StorageError::InvalidKey(format!(
                            "symlink target missing or invalid: {key}"
                        ))
                    } else {
                        StorageError::Io(std::io::Error::new(
                            e.kind(),
                            format!("failed to canonicalize path: {e}"),
                        ))
                    }
                })?;

                if !canonical.starts_with(&root_canonical) {
                    return Err(StorageError::InvalidKey(format!(
                        "resolved path escapes storage root: {key}"
                    )));
                }
                return Ok(path);
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(StorageError::Io(std::io::Error::new(
                    err.kind(),
                    format!("failed to stat path: {err}"),
                )));
            }
        }

        // New path: the nearest existing ancestor must resolve inside the root,
        // otherwise a symlinked directory could redirect the write.
        let mut ancestor = path.as_path();
        while let Some(parent) = ancestor.parent() {
            match std::fs::symlink_metadata(parent) {
                Ok(meta) => {
                    let parent_canonical = parent.canonicalize().map_err(|e| {
                        if meta.file_type().is_symlink() {
                            StorageError::InvalidKey(format!(
                                "ancestor symlink target missing or invalid: {key}"
                            ))
                        } else {
                            StorageError::Io(std::io::Error::new(
                                e.kind(),
                                format!("failed to canonicalize ancestor: {e}"),
                            ))
                        }
                    })?;

                    if !parent_canonical.starts_with(&root_canonical) {
                        return Err(StorageError::InvalidKey(format!(
                            "ancestor path escapes storage root: {key}"
                        )));
                    }
                    break;
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(StorageError::Io(std::io::Error::new(
                        err.kind(),
                        format!("failed to stat ancestor: {err}"),
                    )));
                }
            }
            ancestor = parent;
        }

        Ok(path)
    }

    fn map_not_found(key: &str, e: std::io::Error) -> StorageError {
        if e.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(key.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

#[async_trait]
impl StorageProvider for FilesystemBackend {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let path = self.key_path(key).await?;
        let data = fs::read(&path)
            .await
            .map_err(|e| Self::map_not_found(key, e))?;
        Ok(Bytes::from(data))
    }

    #[instrument(skip(self, data), fields(backend = "filesystem", size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<String> {
        let path = self.key_path(key).await?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Readers never observe a partially written object.
        let temp_name = format!("{TEMP_MARKER}{}", Uuid::new_v4());
        let temp_path = path.with_file_name(
            path.file_name()
                .map(|n| format!("{}{}", n.to_string_lossy(), temp_name))
                .unwrap_or_else(|| temp_name.clone()),
        );
        let written = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            fs::rename(&temp_path, &path).await
        }
        .await;
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::Io(e));
        }

        Ok(path.to_string_lossy().into_owned())
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_path(key).await?;
        fs::remove_file(&path)
            .await
            .map_err(|e| Self::map_not_found(key, e))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_path(key).await?;
        Ok(fs::metadata(&path).await.is_ok_and(|m| m.is_file()))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let base_path = self.key_path(prefix.trim_end_matches('/')).await?;
        let mut results = Vec::new();

        match fs::metadata(&base_path).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Ok(results),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(results),
            Err(e) => return Err(StorageError::Io(e)),
        }

        let mut stack = vec![base_path];
        while let Some(dir) = stack.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                // file_type() does not follow symlinks, which are skipped.
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    stack.push(path);
                } else if file_type.is_file()
                    && !entry.file_name().to_string_lossy().contains(TEMP_MARKER)
                    && let Ok(rel) = path.strip_prefix(&self.root)
                {
                    let key = rel
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    results.push(key);
                }
            }
        }

        results.sort();
        Ok(results)
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}

/// Opens [`FilesystemBackend`]s for bare paths and `file://` URIs.
#[derive(Debug, Default)]
pub struct FilesystemFactory;

impl FilesystemFactory {
    fn root_of(uri: &str) -> Option<&str> {
        let root = match uri.strip_prefix(FILE_SCHEME) {
            Some(rest) => rest,
            None if uri.contains("://") => return None,
            None => uri,
        };
        (!root.trim().is_empty()).then_some(root)
    }
}

#[async_trait]
impl StorageFactory for FilesystemFactory {
    fn supported(&self, uri: &str) -> bool {
        Self::root_of(uri).is_some()
    }

    async fn open(&self, uri: &str) -> StorageResult<Arc<dyn StorageProvider>> {
        let root = Self::root_of(uri).ok_or_else(|| StorageError::NotSupported(uri.to_string()))?;
        Ok(Arc::new(FilesystemBackend::new(root).await?))
    }
}
