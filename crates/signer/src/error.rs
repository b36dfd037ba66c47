//! Signer error types.

use depot_storage::StorageError;
use thiserror::Error;

/// Key management and signing errors.
#[derive(Debug, Error)]
pub enum SignerError {
    #[error("key generation error: {0}")]
    KeyGeneration(String),

    #[error("key parsing error: {0}")]
    KeyParsing(String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("signature verification failed: {0}")]
    VerificationFailed(String),

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("decryption error: {0}")]
    Decryption(String),

    /// The private key of a namespace is absent where it must already exist.
    #[error("no private key for namespace {0}")]
    KeyNotFound(String),

    #[error("key manager mode is not supported: {0}")]
    NotSupported(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for signing operations.
pub type SignerResult<T> = std::result::Result<T, SignerError>;
