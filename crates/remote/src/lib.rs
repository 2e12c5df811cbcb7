//! Client for an upstream package index.
//!
//! The index is treated as an opaque data provider reached through a
//! [`Transport`]. [`Fetcher`] turns transport payloads into validated,
//! locally-named records ([`ReleaseRecord`], [`FileRecord`], [`ChangeRecord`])
//! and exposes them through the [`MetadataClient`] capability that the
//! synchronization engine is handed at construction time.
//!
//! Validation is fail-closed: an unknown change-log action, a malformed
//! requirement predicate or a bad digest aborts the fetch that produced it.

mod client;
mod consts;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod models;
mod predicate;
mod transport;
pub mod validate;

pub use crate::client::{Endpoints, Fetcher, FileStream, MetadataClient, secure_url};
pub use crate::models::{
    Action, ChangeRecord, FileRecord, FileType, PackageVersion, ReleaseRecord, Requirement, normalize,
};
pub use crate::transport::{DEFAULT_DAYTIME_URL, DEFAULT_INDEX_URL, HttpOptions, HttpTransport, Transport};
