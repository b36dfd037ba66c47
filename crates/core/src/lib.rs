//! Core domain types for depot, a signed appliance distribution service.
//!
//! This crate defines the data model shared by every other crate:
//! - Repository and namespace identity, and the storage key space
//! - Artifact entries and the repository manifest
//! - SHA-512 content digests
//! - Configuration

pub mod config;
pub mod error;
pub mod hash;
pub mod manifest;
pub mod repo;

pub use error::{Error, Result};
pub use hash::ContentDigest;
pub use manifest::{ArtifactEntry, Manifest};
pub use repo::{Appliance, NamespaceId, RepoId};
