//! HTTP API server for depot.
//!
//! This crate provides the HTTP adapter over the update service:
//! - Artifact listing, upload, download and removal
//! - Manifest and manifest signature retrieval
//! - Namespace public key retrieval

pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
