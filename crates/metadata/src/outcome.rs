//! Result of persisting a manifest.

use crate::error::{MetadataError, MetadataResult};

/// What happened to the signature after the manifest itself was stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignatureStatus {
    /// `meta.sign` holds a signature over the stored bytes.
    Signed,
    /// No key manager is attached.
    Unsigned,
    /// Signing or storing the signature failed. `meta.sign`, if present, is
    /// stale and will not verify.
    Failed(String),
}

/// A stored manifest and its signature status.
#[derive(Clone, Debug)]
pub struct SaveOutcome {
    /// Backend location of `meta.json`.
    pub location: String,
    pub signature: SignatureStatus,
}

impl SaveOutcome {
    pub fn is_signed(&self) -> bool {
        self.signature == SignatureStatus::Signed
    }

    /// Turn anything short of a fresh signature into an error.
    pub fn require_signed(self) -> MetadataResult<Self> {
        match &self.signature {
            SignatureStatus::Signed => Ok(self),
            SignatureStatus::Unsigned => Err(MetadataError::Unsigned(self.location)),
            SignatureStatus::Failed(reason) => Err(MetadataError::SigningFailed(reason.clone())),
        }
    }
}
