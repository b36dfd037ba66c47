//! Signed repository manifests for depot.
//!
//! This crate provides the update service that owns one repository's
//! manifest: loading or creating it, recording and removing artifacts,
//! persisting every change and re-signing it with the namespace key.

pub mod error;
pub mod locks;
pub mod outcome;
pub mod service;

pub use error::{MetadataError, MetadataResult};
pub use locks::ManifestLocks;
pub use outcome::{SaveOutcome, SignatureStatus};
pub use service::{ArtifactUpload, LockedUpdateService, Repositories, UpdateService};
