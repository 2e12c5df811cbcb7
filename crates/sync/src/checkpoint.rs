//! Where the last fully processed upstream clock value is kept.

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use wharf_store::Repository;

/// Key of the change-log checkpoint in the checkpoint table.
pub const CHECKPOINT_KEY: &str = "changelog";

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// The stored checkpoint, `None` before the first successful batch.
    async fn get(&self) -> Result<Option<i64>>;
    async fn set(&self, checkpoint: i64) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct SqliteCheckpointStore {
    repo: Repository,
    key: String,
}

impl SqliteCheckpointStore {
    pub fn new(repo: Repository) -> Self {
        Self::with_key(repo, CHECKPOINT_KEY)
    }

    /// A checkpoint under a different key, for mirrors that follow more than
    /// one change log from the same database.
    pub fn with_key(repo: Repository, key: impl Into<String>) -> Self {
        Self { repo, key: key.into() }
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn get(&self) -> Result<Option<i64>> {
        self.repo.get_checkpoint(&self.key).await.or_raise(|| ErrorKind::Checkpoint)
    }

    async fn set(&self, checkpoint: i64) -> Result<()> {
        self.repo.set_checkpoint(&self.key, checkpoint).await.or_raise(|| ErrorKind::Checkpoint)
    }
}
