//! RSA key types and PEM encoding.
//!
//! Private keys are PKCS#1 (`RSA PRIVATE KEY`) and public keys are
//! SubjectPublicKeyInfo (`PUBLIC KEY`). PKCS#1 public keys are accepted on
//! input.

use crate::error::{SignerError, SignerResult};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey, LineEnding};
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fmt;

/// Modulus size of generated keys.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// A secret (private) key for signing and decryption.
pub struct SecretKey {
    inner: RsaPrivateKey,
}

impl SecretKey {
    /// Generate a new random key. This is CPU bound; async callers should
    /// run it on the blocking pool.
    pub fn generate(bits: usize) -> SignerResult<Self> {
        let mut rng = rand_core::OsRng;
        let inner = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| SignerError::KeyGeneration(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Parse a PKCS#1 PEM private key.
    pub fn from_pem(pem: &str) -> SignerResult<Self> {
        let inner = RsaPrivateKey::from_pkcs1_pem(pem)
            .map_err(|e| SignerError::KeyParsing(format!("invalid private key: {e}")))?;
        Ok(Self { inner })
    }

    /// Parse PEM bytes as read from storage.
    pub fn from_pem_bytes(pem: &[u8]) -> SignerResult<Self> {
        let pem = std::str::from_utf8(pem)
            .map_err(|e| SignerError::KeyParsing(format!("private key is not UTF-8: {e}")))?;
        Self::from_pem(pem)
    }

    /// Encode as PKCS#1 PEM.
    pub fn to_pem(&self) -> SignerResult<String> {
        self.inner
            .to_pkcs1_pem(LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| SignerError::KeyGeneration(format!("failed to encode private key: {e}")))
    }

    /// Get the corresponding public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            inner: self.inner.to_public_key(),
        }
    }

    pub(crate) fn rsa(&self) -> &RsaPrivateKey {
        &self.inner
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey([REDACTED])")
    }
}

/// A public key for verification and encryption.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    inner: RsaPublicKey,
}

impl PublicKey {
    /// Parse a PEM public key, SPKI or PKCS#1.
    pub fn from_pem(pem: &str) -> SignerResult<Self> {
        let inner = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map_err(|e| SignerError::KeyParsing(format!("invalid public key: {e}")))?;
        Ok(Self { inner })
    }

    /// Parse PEM bytes as fetched from a server or cache.
    pub fn from_pem_bytes(pem: &[u8]) -> SignerResult<Self> {
        let pem = std::str::from_utf8(pem)
            .map_err(|e| SignerError::KeyParsing(format!("public key is not UTF-8: {e}")))?;
        Self::from_pem(pem)
    }

    /// Encode as SPKI PEM.
    pub fn to_pem(&self) -> SignerResult<String> {
        self.inner
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| SignerError::KeyGeneration(format!("failed to encode public key: {e}")))
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.inner.size() * 8
    }

    pub(crate) fn rsa(&self) -> &RsaPublicKey {
        &self.inner
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey(rsa-{})", self.bits())
    }
}

/// A key pair containing both secret and public keys.
pub struct KeyPair {
    pub secret: SecretKey,
    pub public: PublicKey,
}

impl KeyPair {
    /// Generate a new key pair.
    pub fn generate(bits: usize) -> SignerResult<Self> {
        let secret = SecretKey::generate(bits)?;
        let public = secret.public_key();
        Ok(Self { secret, public })
    }

    /// Both halves PEM encoded, private first.
    pub fn to_pem_pair(&self) -> SignerResult<(String, String)> {
        Ok((self.secret.to_pem()?, self.public.to_pem()?))
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .finish()
    }
}
