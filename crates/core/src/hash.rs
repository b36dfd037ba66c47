//! Artifact content digests.
//!
//! Artifacts are identified in the manifest by the lowercase hex SHA-512 of
//! their bytes. Uploads carry the same value in a `Digest: sha512:<hex>` header.

use sha2::{Digest, Sha512};
use std::fmt;

/// Algorithm label used in `Digest` headers.
pub const DIGEST_ALGORITHM: &str = "sha512";

/// Length of a SHA-512 digest in bytes.
pub const DIGEST_LEN: usize = 64;

/// A SHA-512 content digest represented as 64 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; DIGEST_LEN]);

impl ContentDigest {
    /// Create a new digest from raw bytes.
    pub fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Compute the SHA-512 digest of data.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha512::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        if s.len() != DIGEST_LEN * 2 {
            return Err(crate::Error::InvalidHash(format!(
                "expected {} hex chars, got {}",
                DIGEST_LEN * 2,
                s.len()
            )));
        }
        let mut bytes = [0u8; DIGEST_LEN];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hex_str =
                std::str::from_utf8(chunk).map_err(|e| crate::Error::InvalidHash(e.to_string()))?;
            bytes[i] = u8::from_str_radix(hex_str, 16)
                .map_err(|e| crate::Error::InvalidHash(e.to_string()))?;
        }
        Ok(Self(bytes))
    }

    /// Encode as lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Parse a `sha512:<hex>` digest header value.
    pub fn from_digest_header(value: &str) -> crate::Result<Self> {
        let (algorithm, hex) = value.trim().split_once(':').ok_or_else(|| {
            crate::Error::InvalidHash(format!("expected '{DIGEST_ALGORITHM}:<hex>', got: {value}"))
        })?;
        if !algorithm.eq_ignore_ascii_case(DIGEST_ALGORITHM) {
            return Err(crate::Error::InvalidHash(format!(
                "unsupported digest algorithm: {algorithm}"
            )));
        }
        Self::from_hex(&hex.to_ascii_lowercase())
    }

    /// Encode as a `sha512:<hex>` digest header value.
    pub fn to_digest_header(&self) -> String {
        format!("{DIGEST_ALGORITHM}:{}", self.to_hex())
    }

    /// Check that this digest matches the hex value declared elsewhere.
    pub fn verify_hex(&self, expected: &str) -> crate::Result<()> {
        let actual = self.to_hex();
        if actual != expected {
            return Err(crate::Error::HashMismatch {
                expected: expected.to_string(),
                actual,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        // sha512("abc")
        let expected = "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
                        2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f";
        assert_eq!(ContentDigest::compute(b"abc").to_hex(), expected);
    }

    #[test]
    fn test_digest_header() {
        let digest = ContentDigest::compute(b"payload");
        let header = digest.to_digest_header();
        assert!(header.starts_with("sha512:"));
        assert_eq!(ContentDigest::from_digest_header(&header).unwrap(), digest);

        let upper = format!("SHA512:{}", digest.to_hex().to_uppercase());
        assert_eq!(ContentDigest::from_digest_header(&upper).unwrap(), digest);

        assert!(ContentDigest::from_digest_header("sha256:abcd").is_err());
        assert!(ContentDigest::from_digest_header("no-separator").is_err());
    }

    #[test]
    fn test_verify_hex_mismatch() {
        let digest = ContentDigest::compute(b"one");
        assert!(digest.verify_hex(&digest.to_hex()).is_ok());
        match digest.verify_hex("deadbeef") {
            Err(crate::Error::HashMismatch { expected, .. }) => assert_eq!(expected, "deadbeef"),
            other => panic!("expected hash mismatch, got {other:?}"),
        }
    }
}
