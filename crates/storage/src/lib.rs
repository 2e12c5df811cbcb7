//! Content store for mirrored distribution files.
//!
//! File bytes are saved under a key derived from their BLAKE3 digest (see
//! [`content_key`]), so the same upload saved twice lands in one place and a
//! key never changes meaning. Backends only need to store opaque keys and
//! turn them into URLs.

pub mod backend;
pub mod error;
mod key;

pub use crate::backend::StorageBackend;
pub use crate::key::{content_key, validate_key};
use std::sync::Arc;

/// Shared handle to whichever backend is configured.
pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
