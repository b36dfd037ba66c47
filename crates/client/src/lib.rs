//! Repository client for depot.
//!
//! This crate provides:
//! - [`RepoUrl`] parsing and local cache key layout
//! - The [`RemoteRepository`] trait and its HTTP implementation
//! - [`Synchronizer`]: manifest sync with signature verification, and
//!   hash-checked downloads
//! - [`ClientConfig`]: saved repositories and the cache directory

pub mod config;
pub mod error;
pub mod remote;
pub mod sync;
pub mod url;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use remote::{DIGEST_HEADER, HttpRemote, RemoteRepository, UploadReceipt};
pub use sync::{PulledArtifact, Synchronizer, VerifiedManifest};
pub use url::RepoUrl;
