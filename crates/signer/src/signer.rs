//! Manifest signing, verification and RSA encryption.
//!
//! Signatures are SHA-256 digests signed with RSA PKCS#1 v1.5 and are
//! computed over exact bytes. Verification never panics: a malformed key or
//! signature is reported as [`SignerError::VerificationFailed`].

use crate::error::{SignerError, SignerResult};
use crate::key::{PublicKey, SecretKey};
use rsa::Pkcs1v15Encrypt;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use sha2::Sha256;

/// Sign `data` with SHA-256 / PKCS#1 v1.5.
pub fn sign_sha256(secret: &SecretKey, data: &[u8]) -> SignerResult<Vec<u8>> {
    let signing_key = SigningKey::<Sha256>::new(secret.rsa().clone());
    let signature = signing_key
        .try_sign(data)
        .map_err(|e| SignerError::Signing(e.to_string()))?;
    Ok(signature.to_vec())
}

/// Sign `data` with a PEM private key.
pub fn sign_sha256_pem(private_pem: &[u8], data: &[u8]) -> SignerResult<Vec<u8>> {
    sign_sha256(&SecretKey::from_pem_bytes(private_pem)?, data)
}

/// Verify a SHA-256 / PKCS#1 v1.5 signature over `content`.
pub fn verify(public: &PublicKey, content: &[u8], signature: &[u8]) -> SignerResult<()> {
    let signature = Signature::try_from(signature)
        .map_err(|e| SignerError::VerificationFailed(format!("malformed signature: {e}")))?;
    VerifyingKey::<Sha256>::new(public.rsa().clone())
        .verify(content, &signature)
        .map_err(|_| SignerError::VerificationFailed("signature does not match".to_string()))
}

/// Verify a signature with a PEM public key as served by a repository.
pub fn verify_sha256(public_pem: &[u8], content: &[u8], signature: &[u8]) -> SignerResult<()> {
    let public = PublicKey::from_pem_bytes(public_pem)
        .map_err(|e| SignerError::VerificationFailed(e.to_string()))?;
    verify(&public, content, signature)
}

/// Encrypt `data` for the holder of the private key (PKCS#1 v1.5).
pub fn encrypt_for(public_pem: &[u8], data: &[u8]) -> SignerResult<Vec<u8>> {
    let public = PublicKey::from_pem_bytes(public_pem)?;
    let mut rng = rand_core::OsRng;
    public
        .rsa()
        .encrypt(&mut rng, Pkcs1v15Encrypt, data)
        .map_err(|e| SignerError::Encryption(e.to_string()))
}

/// Decrypt PKCS#1 v1.5 ciphertext.
pub fn decrypt(secret: &SecretKey, data: &[u8]) -> SignerResult<Vec<u8>> {
    secret
        .rsa()
        .decrypt(Pkcs1v15Encrypt, data)
        .map_err(|e| SignerError::Decryption(e.to_string()))
}
