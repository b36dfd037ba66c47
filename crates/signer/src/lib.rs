//! Namespace key management and manifest signing for depot.
//!
//! This crate provides:
//! - RSA key generation and PEM encoding
//! - SHA-256 / PKCS#1 v1.5 signing and verification, and PKCS#1 v1.5
//!   encryption
//! - The [`KeyManager`] trait, the `peruser` implementation and a registry
//!   selecting managers by mode name

pub mod error;
pub mod key;
pub mod manager;
pub mod peruser;
pub mod registry;
pub mod signer;

pub use error::{SignerError, SignerResult};
pub use key::{DEFAULT_KEY_BITS, KeyPair, PublicKey, SecretKey};
pub use manager::{KeyManager, KeyManagerFactory};
pub use peruser::{KeyOrigin, PERUSER_MODE, PerNamespaceFactory, PerNamespaceKeyManager};
pub use registry::{KeyManagerRegistry, from_config};
pub use signer::{decrypt, encrypt_for, sign_sha256, verify, verify_sha256};
