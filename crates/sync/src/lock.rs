//! Distributed mutual exclusion per project.
//!
//! A [`LockService`] hands out leases on string keys. Whoever holds a lease
//! is identified by a random token, and release is a compare-and-delete on
//! that token so a worker whose lease already expired can never free a lock
//! that someone else has since taken over.

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument};
use uuid::Uuid;
use wharf_remote::normalize;
use wharf_store::Repository;

/// The lock key guarding resynchronization of `project`.
///
/// Every spelling of a project name maps onto the same key.
pub fn lock_key(project: &str) -> String {
    format!("sync-lock:{}", normalize(project))
}

/// A held lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lock {
    pub key: String,
    pub token: String,
}

#[async_trait]
pub trait LockService: Send + Sync {
    /// Take the lock on `key` for `lease`, waiting at most `wait` for a
    /// current holder to let go.
    ///
    /// Fails with [`ErrorKind::LockTimeout`] when the wait runs out.
    async fn acquire(&self, key: &str, lease: Duration, wait: Duration) -> Result<Lock>;

    /// Give the lock back. Returns `false` if the lease had already expired
    /// and was possibly taken over.
    async fn release(&self, lock: Lock) -> Result<bool>;
}

/// [`LockService`] backed by the lease table of the mirror database, so
/// every worker sharing the database shares the locks.
#[derive(Debug, Clone)]
pub struct SqliteLockService {
    repo: Repository,
    poll: Duration,
}

impl SqliteLockService {
    pub fn new(repo: Repository, poll: Duration) -> Self {
        Self { repo, poll }
    }
}

#[async_trait]
impl LockService for SqliteLockService {
    #[instrument(level = "debug", skip(self))]
    async fn acquire(&self, key: &str, lease: Duration, wait: Duration) -> Result<Lock> {
        let token = Uuid::new_v4().to_string();
        let deadline = Instant::now() + wait;
        loop {
            if self.repo.try_acquire_lease(key, &token, lease).await.or_raise(|| ErrorKind::Lock)? {
                debug!("lock acquired");
                return Ok(Lock {
                    key: key.to_string(),
                    token,
                });
            }
            let now = Instant::now();
            if now >= deadline {
                exn::bail!(ErrorKind::LockTimeout(key.to_string()));
            }
            tokio::time::sleep(self.poll.min(deadline - now)).await;
        }
    }

    #[instrument(level = "debug", skip_all, fields(key = %lock.key))]
    async fn release(&self, lock: Lock) -> Result<bool> {
        self.repo.release_lease(&lock.key, &lock.token).await.or_raise(|| ErrorKind::Lock)
    }
}
