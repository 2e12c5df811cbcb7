//! Fixtures shared by the tests in this crate.

use crate::Synchronizer;
use std::path::Path;
use std::sync::Arc;
use wharf_config::SyncConfig;
use wharf_remote::mock::MockIndex;
use wharf_storage::backend::MockBackend;
use wharf_store::{Database, Repository};

pub(crate) struct Harness {
    pub db: Database,
    pub repo: Repository,
    pub index: Arc<MockIndex>,
    pub storage: Arc<MockBackend>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_database(Database::connect_in_memory().await.unwrap())
    }

    /// A harness over a database file, where writers really do contend.
    pub async fn on_disk(path: &Path) -> Self {
        Self::with_database(Database::connect(path, Some(5)).await.unwrap())
    }

    fn with_database(db: Database) -> Self {
        let repo = Repository::from(&db);
        Self {
            db,
            repo,
            index: Arc::new(MockIndex::new()),
            storage: Arc::new(MockBackend::default()),
        }
    }

    pub fn synchronizer(&self, config: SyncConfig) -> Synchronizer {
        Synchronizer::new(self.index.clone(), self.repo.clone(), self.storage.clone(), config)
    }

    /// How many recorded upstream calls start with `prefix`.
    pub fn calls(&self, prefix: &str) -> usize {
        self.index.calls().iter().filter(|call| call.starts_with(prefix)).count()
    }
}

pub(crate) fn config() -> SyncConfig {
    SyncConfig {
        lock_poll_millis: 10,
        ..SyncConfig::default()
    }
}

pub(crate) fn md5(content: &[u8]) -> String {
    wharf_store::digest::digest(content)["md5"].clone()
}
