use crate::error::{ErrorKind, Result};
use crate::project_dirs;
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub remote: RemoteConfig,
    pub sync: SyncConfig,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.database.max_connections == 0 {
            exn::bail!(ErrorKind::Invalid("database.max_connections"));
        }
        self.storage.base_url()?;
        if self.remote.timeout_secs == 0 {
            exn::bail!(ErrorKind::Invalid("remote.timeout_secs"));
        }
        Url::parse(&self.remote.index_url).or_raise(|| ErrorKind::Invalid("remote.index_url"))?;
        Url::parse(&self.remote.daytime_url).or_raise(|| ErrorKind::Invalid("remote.daytime_url"))?;
        self.sync.validate()
    }
}

fn data_dir() -> PathBuf {
    project_dirs().map(|dirs| dirs.data_dir().to_path_buf()).unwrap_or_else(|| PathBuf::from("."))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file.
    pub path: PathBuf,
    pub max_connections: u32,
}
impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: data_dir().join("mirror.sqlite3"),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory of the content store.
    pub root: PathBuf,
    /// Public URL prefix that stored keys are joined onto.
    pub base_url: Option<String>,
}
impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: data_dir().join("packages"),
            base_url: None,
        }
    }
}
impl StorageConfig {
    pub fn base_url(&self) -> Result<Option<Url>> {
        self.base_url
            .as_deref()
            .map(|raw| Url::parse(raw).or_raise(|| ErrorKind::Invalid("storage.base_url")))
            .transpose()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub index_url: String,
    pub daytime_url: String,
    pub user_agent: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
}
impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            index_url: "https://pypi.python.org/pypi".to_string(),
            daytime_url: "https://pypi.python.org/daytime".to_string(),
            user_agent: concat!("wharf/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 30,
        }
    }
}
impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum number of project tasks in flight.
    pub concurrency: usize,
    /// Hard deadline for one batch.
    pub timeout_secs: u64,
    /// `true` always downloads file bytes, `false` never does, unset
    /// downloads when the stored digest is missing or stale.
    pub download: Option<bool>,
    /// Abort the batch on the first failed project.
    pub raise_immediately: bool,
    /// Write the checkpoint after a successful batch.
    pub store_checkpoint: bool,
    pub lock_lease_secs: u64,
    pub lock_wait_secs: u64,
    pub lock_poll_millis: u64,
    /// Re-run the batch after this many seconds, forever.
    pub repeat_every_secs: Option<u64>,
}
impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            timeout_secs: 3600,
            download: None,
            raise_immediately: false,
            store_checkpoint: true,
            lock_lease_secs: 600,
            lock_wait_secs: 30,
            lock_poll_millis: 250,
            repeat_every_secs: None,
        }
    }
}
impl SyncConfig {
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            exn::bail!(ErrorKind::Invalid("sync.concurrency"));
        }
        if self.timeout_secs == 0 {
            exn::bail!(ErrorKind::Invalid("sync.timeout_secs"));
        }
        if self.lock_lease_secs == 0 {
            exn::bail!(ErrorKind::Invalid("sync.lock_lease_secs"));
        }
        if self.lock_poll_millis == 0 {
            exn::bail!(ErrorKind::Invalid("sync.lock_poll_millis"));
        }
        if self.lock_wait_secs > self.lock_lease_secs {
            exn::bail!(ErrorKind::Invalid("sync.lock_wait_secs"));
        }
        if self.repeat_every_secs == Some(0) {
            exn::bail!(ErrorKind::Invalid("sync.repeat_every_secs"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn lock_lease(&self) -> Duration {
        Duration::from_secs(self.lock_lease_secs)
    }

    pub fn lock_wait(&self) -> Duration {
        Duration::from_secs(self.lock_wait_secs)
    }

    pub fn lock_poll(&self) -> Duration {
        Duration::from_millis(self.lock_poll_millis)
    }

    pub fn repeat_every(&self) -> Option<Duration> {
        self.repeat_every_secs.map(Duration::from_secs)
    }
}
