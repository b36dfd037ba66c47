//! Storage backend implementations.

pub mod filesystem;
pub mod memory;

pub use filesystem::{FilesystemBackend, FilesystemFactory};
pub use memory::{MemoryBackend, MemoryFactory};
