//! HTTP request handlers.

pub mod health;
pub mod repository;

pub use health::*;
pub use repository::*;
