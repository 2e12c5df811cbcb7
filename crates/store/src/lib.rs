//! SQLite persistence for the mirrored package catalogue.
//!
//! The catalogue is a three-level hierarchy: projects own versions, which
//! own distribution files. Rows are never hard-deleted by synchronization;
//! they are *yanked* instead, and a yanked row is only ever replaced by a
//! fresh one when the remote record reappears.
//!
//! # Architecture
//! - [`Database`] owns the connection pool and runs embedded migrations.
//! - [`Repository`] serves reads, checkpoints and leases from the pool.
//! - [`Reconciler`] wraps a single write transaction and carries the
//!   idempotent upserts, the set-based yank operations and the journal.

mod db;
mod diff;
pub mod digest;
pub mod error;
mod fetch;
pub mod models;
mod rank;
mod reconciler;
mod repo;

pub use crate::db::Database;
pub use crate::diff::RenameOutcome;
pub use crate::digest::StoredContent;
pub use crate::reconciler::Reconciler;
pub use crate::repo::Repository;
