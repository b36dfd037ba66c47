//! Repository manifest and artifact entries.
//!
//! The manifest is the unit of signing: the exact bytes produced by
//! [`Manifest::to_bytes`] are persisted and signed, and clients verify the
//! signature over the bytes they fetched, never over a re-serialization.

use crate::error::{Error, Result};
use crate::repo::RepoId;
use serde::{Deserialize, Deserializer, Serialize};
use time::{Duration, OffsetDateTime};

/// Default advisory life time of an artifact entry (half a year).
pub const DEFAULT_LIFECYCLE: Duration = Duration::days(180);

/// Go-era manifests serialize an empty item list as `null`.
fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// One artifact recorded in a manifest.
///
/// Entries are identified by `full_name` alone: a changed hash list or
/// timestamp is an update of the same entry, not a new one.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ArtifactEntry {
    /// Unique name within the repository (for `app`: `os-arch-name:tag`).
    pub full_name: String,
    /// One hex SHA-512 per content part or layer.
    #[serde(alias = "SHAS")]
    pub content_hashes: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339", alias = "Expired")]
    pub expires: OffsetDateTime,
}

impl ArtifactEntry {
    /// Create an entry stamped now, expiring after [`DEFAULT_LIFECYCLE`].
    pub fn new(full_name: impl Into<String>, content_hashes: Vec<String>) -> Result<Self> {
        let now = OffsetDateTime::now_utc();
        let entry = Self {
            full_name: full_name.into(),
            content_hashes,
            created: now,
            updated: now,
            expires: now + DEFAULT_LIFECYCLE,
        };
        entry.validate()?;
        Ok(entry)
    }

    /// Check the entry invariants.
    pub fn validate(&self) -> Result<()> {
        if self.full_name.is_empty() {
            return Err(Error::Validation("full name must not be empty".to_string()));
        }
        if self.content_hashes.is_empty() {
            return Err(Error::Validation(format!(
                "content hashes of {} must not be empty",
                self.full_name
            )));
        }
        Ok(())
    }

    /// The hash of the first content part.
    pub fn primary_hash(&self) -> Option<&str> {
        self.content_hashes.first().map(String::as_str)
    }

    /// Whether the advisory expiry has passed.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc())
    }

    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires < now
    }
}

impl PartialEq for ArtifactEntry {
    fn eq(&self, other: &Self) -> bool {
        self.full_name == other.full_name
    }
}

impl Eq for ArtifactEntry {}

/// The signed list of artifacts of one repository.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Manifest {
    pub proto: String,
    pub version: String,
    pub namespace: String,
    pub repository: String,
    /// Insertion ordered, unique by `full_name`.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<ArtifactEntry>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated: OffsetDateTime,
}

impl Manifest {
    /// Create an empty manifest for a repository.
    pub fn new(repo: &RepoId) -> Self {
        Self {
            proto: repo.proto.clone(),
            version: repo.version.clone(),
            namespace: repo.namespace.clone(),
            repository: repo.repository.clone(),
            items: Vec::new(),
            updated: OffsetDateTime::now_utc(),
        }
    }

    /// The identity of the repository this manifest describes.
    pub fn repo_id(&self) -> RepoId {
        RepoId::new(
            &self.proto,
            &self.version,
            &self.namespace,
            &self.repository,
        )
    }

    /// Find an entry by full name.
    pub fn find(&self, full_name: &str) -> Option<&ArtifactEntry> {
        self.items.iter().find(|item| item.full_name == full_name)
    }

    /// Replace the entry with the same full name in place, or append it.
    ///
    /// Returns `true` when an existing entry was replaced.
    pub fn upsert(&mut self, entry: ArtifactEntry) -> bool {
        match self.items.iter_mut().find(|item| **item == entry) {
            Some(existing) => {
                *existing = entry;
                true
            }
            None => {
                self.items.push(entry);
                false
            }
        }
    }

    /// Remove the first entry with the given full name.
    pub fn remove(&mut self, full_name: &str) -> Option<ArtifactEntry> {
        let position = self
            .items
            .iter()
            .position(|item| item.full_name == full_name)?;
        Some(self.items.remove(position))
    }

    /// Full names in manifest order.
    pub fn names(&self) -> Vec<String> {
        self.items.iter().map(|i| i.full_name.clone()).collect()
    }

    /// Serialize to the persisted (and signed) byte form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from persisted bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(|e| Error::Serialization(e.to_string()))
    }
}
