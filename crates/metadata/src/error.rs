//! Update service error types.

use depot_signer::SignerError;
use depot_storage::StorageError;
use thiserror::Error;

/// Manifest management errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("invalid manifest: {0}")]
    Serialization(String),

    #[error("manifest signature missing: {0}")]
    Unsigned(String),

    #[error("manifest signing failed: {0}")]
    SigningFailed(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("signer error: {0}")]
    Signer(#[from] SignerError),
}

impl From<depot_core::Error> for MetadataError {
    fn from(err: depot_core::Error) -> Self {
        match err {
            depot_core::Error::Validation(msg) | depot_core::Error::InvalidHash(msg) => {
                Self::Validation(msg)
            }
            depot_core::Error::HashMismatch { expected, actual } => {
                Self::HashMismatch { expected, actual }
            }
            depot_core::Error::Serialization(msg) => Self::Serialization(msg),
        }
    }
}

impl MetadataError {
    /// Whether the error means the manifest, entry or blob is absent.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Storage(e) => e.is_not_found(),
            _ => false,
        }
    }
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;
