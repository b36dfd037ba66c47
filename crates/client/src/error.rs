//! Client error types.

use depot_storage::StorageError;
use thiserror::Error;

/// Client errors. Integrity failures are distinct variants so callers can
/// tell a tampered repository from an unreachable one.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid repository url: {0}")]
    InvalidUrl(String),

    /// Fetching or caching one of the manifest, signature or key failed.
    #[error("sync incomplete: failed to {stage}: {reason}")]
    SyncIncomplete { stage: &'static str, reason: String },

    #[error("manifest signature mismatch: {0}")]
    SignatureMismatch(String),

    #[error("manifest describes {actual}, expected {expected}")]
    ManifestMismatch { expected: String, actual: String },

    #[error("hash mismatch for {name}: expected {expected}, got {actual}")]
    HashMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("{0} is not in the manifest")]
    NotInManifest(String),

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Core(#[from] depot_core::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Whether the error is a failed integrity check.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            Self::SignatureMismatch(_) | Self::ManifestMismatch { .. } | Self::HashMismatch { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status == 404,
            Self::Storage(e) => e.is_not_found(),
            _ => false,
        }
    }
}

/// Result type for client operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;
