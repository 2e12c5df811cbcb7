//! Keeps the local mirror in step with the upstream index.
//!
//! A [`Synchronizer`] runs batches. Each batch works out which projects
//! changed, either from the upstream change log (incremental) or from the
//! full project listing, and resynchronizes each of them under a
//! per-project lock from a [`LockService`]. Progress through the change
//! log is kept in a [`CheckpointStore`].
//!
//! ```no_run
//! use exn::ResultExt;
//! use wharf_config::Config;
//! use wharf_sync::error::{ErrorKind, Result};
//! use wharf_sync::{SyncRequest, Synchronizer};
//!
//! # async fn example() -> Result<()> {
//! let config = Config::load(None).or_raise(|| ErrorKind::Config)?;
//! let synchronizer = Synchronizer::connect(&config).await?;
//! let report = synchronizer.run(&SyncRequest::journal()).await?;
//! println!("updated {} projects", report.updated.len());
//! # Ok(())
//! # }
//! ```

pub mod checkpoint;
pub mod error;
mod journal;
pub mod lock;
mod synchronizer;
mod task;
#[cfg(test)]
mod testing;

pub use crate::checkpoint::{CHECKPOINT_KEY, CheckpointStore, SqliteCheckpointStore};
pub use crate::lock::{Lock, LockService, SqliteLockService, lock_key};
pub use crate::synchronizer::{Report, SyncMode, SyncRequest, Synchronizer};
pub use crate::task::TaskSummary;
