//! Pool-level access to the mirror database.
//!
//! Reads, the checkpoint table and the lease table live here. Every write to
//! the catalogue goes through a [`Reconciler`], opened with
//! [`Repository::begin`], so that one project's changes commit or roll back
//! as a unit.

use crate::error::{ErrorKind, Result};
use crate::models::{Classifier, ClassifierRow, File, JournalEntry, JournalRow, Project, Requirements, Version};
use crate::{Database, Reconciler, fetch};
use exn::ResultExt;
use sqlx::SqlitePool;
use std::time::Duration;
use time::UtcDateTime;
use tracing::{debug, instrument};
use wharf_remote::normalize;

/// Current time in unix milliseconds, the resolution of lease expiry.
fn now_millis() -> Result<i64> {
    let millis = UtcDateTime::now().unix_timestamp_nanos() / 1_000_000;
    i64::try_from(millis).or_raise(|| ErrorKind::InvalidData("lease clock"))
}

#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a write transaction stamped with the current time.
    ///
    /// The write lock is taken up front, so concurrent reconcilers queue on
    /// the busy timeout instead of failing to upgrade a read lock. With a
    /// single-connection pool (in-memory databases), no other repository
    /// query may run until the reconciler is committed or dropped.
    pub async fn begin(&self) -> Result<Reconciler> {
        let tx = self.pool.begin_with("BEGIN IMMEDIATE").await.or_raise(|| ErrorKind::Database)?;
        Ok(Reconciler::new(tx, UtcDateTime::now()))
    }

    // =========================================================================
    // Catalogue
    // =========================================================================

    /// Look a project up by any spelling of its name.
    pub async fn get_project(&self, name: impl AsRef<str>) -> Result<Option<Project>> {
        fetch::project(&self.pool, &normalize(name)).await
    }

    /// All projects that are not yanked, by normalized name.
    pub async fn list_live_projects(&self) -> Result<Vec<Project>> {
        fetch::live_projects(&self.pool).await
    }

    pub async fn get_version(&self, project: &Project, version: impl AsRef<str>) -> Result<Option<Version>> {
        fetch::version(&self.pool, project.id, version.as_ref()).await
    }

    /// Every version of a project, yanked or not, in rank order.
    pub async fn list_versions(&self, project: &Project) -> Result<Vec<Version>> {
        fetch::versions(&self.pool, project.id).await
    }

    pub async fn get_file(&self, filename: impl AsRef<str>) -> Result<Option<File>> {
        fetch::file(&self.pool, filename.as_ref()).await
    }

    pub async fn list_files(&self, version: &Version) -> Result<Vec<File>> {
        fetch::files(&self.pool, version.id).await
    }

    pub async fn requirements(&self, version: &Version) -> Result<Requirements> {
        fetch::requirements(&self.pool, version.id).await
    }

    pub async fn version_classifiers(&self, version: &Version) -> Result<Vec<String>> {
        fetch::version_classifiers(&self.pool, version.id).await
    }

    pub async fn list_classifiers(&self) -> Result<Vec<Classifier>> {
        let rows: Vec<ClassifierRow> = sqlx::query_as(include_str!("../queries/list_classifiers.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(rows)
    }

    // =========================================================================
    // Journal
    // =========================================================================

    /// Whether the change with this upstream sequence id was already applied.
    pub async fn journal_contains(&self, remote_id: i64) -> Result<bool> {
        sqlx::query_scalar(include_str!("../queries/journal_contains.sql"))
            .bind(remote_id)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    pub async fn list_journal(&self) -> Result<Vec<JournalEntry>> {
        let rows: Vec<JournalRow> = sqlx::query_as(include_str!("../queries/list_journal.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(JournalEntry::try_from).collect()
    }

    // =========================================================================
    // Checkpoints
    // =========================================================================

    pub async fn get_checkpoint(&self, key: &str) -> Result<Option<i64>> {
        sqlx::query_scalar(include_str!("../queries/get_checkpoint.sql"))
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    #[instrument(skip(self))]
    pub async fn set_checkpoint(&self, key: &str, value: i64) -> Result<()> {
        sqlx::query(include_str!("../queries/set_checkpoint.sql"))
            .bind(key)
            .bind(value)
            .bind(UtcDateTime::now().unix_timestamp())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    // =========================================================================
    // Leases
    // =========================================================================

    /// Take the lease on `key` for `token` unless another live token holds it.
    ///
    /// An expired lease is taken over. Returns `true` on success.
    pub async fn try_acquire_lease(&self, key: &str, token: &str, lease: Duration) -> Result<bool> {
        let now = now_millis()?;
        let lease = i64::try_from(lease.as_millis()).or_raise(|| ErrorKind::InvalidData("lease duration"))?;
        let result = sqlx::query(include_str!("../queries/acquire_lease.sql"))
            .bind(key)
            .bind(token)
            .bind(now.saturating_add(lease))
            .bind(now)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() == 1)
    }

    /// Release the lease on `key` if, and only if, `token` still holds it.
    pub async fn release_lease(&self, key: &str, token: &str) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/release_lease.sql"))
            .bind(key)
            .bind(token)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() == 0 {
            debug!(key, "lease already expired or taken over");
        }
        Ok(result.rows_affected() == 1)
    }
}
