//! Connection pool for the mirror database.
//!
//! Every connection is opened in WAL mode with foreign keys enforced; the
//! yank cascade and the revival-by-recreation path both rely on the
//! `ON DELETE CASCADE` constraints. Migrations are embedded and applied on
//! connect.

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteAutoVacuum, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::{ErrorKind, Result};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
/// How long a writer waits for another worker's transaction to commit.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle on the mirror database. Cloning shares the pool.
///
/// Build a [`Repository`](crate::Repository) from it for reads and to open
/// write transactions.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database file at `path`.
    pub async fn connect(path: impl AsRef<Path>, max_connections: Option<u32>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening mirror database");
        let options = Self::options().filename(path).create_if_missing(true);
        Self::open(options, max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS)).await
    }

    /// A private in-memory database, for tests in this and other crates.
    ///
    /// The pool holds a single connection: every new connection to
    /// `:memory:` would otherwise see its own empty database. A caller
    /// holding an open [`Reconciler`](crate::Reconciler) therefore blocks
    /// every other query until it commits.
    pub async fn connect_in_memory() -> Result<Self> {
        Self::open(Self::options().filename(":memory:"), 1).await
    }

    fn options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT)
            .auto_vacuum(SqliteAutoVacuum::None)
    }

    async fn open(options: SqliteConnectOptions, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            // Per-connection settings must be applied to every connection
            // the pool opens, not just the first one.
            .after_connect(|conn, meta| Box::pin(async move { Self::tune(conn, meta).await }))
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Settings with no builder method on [`SqliteConnectOptions`].
    async fn tune(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query(
            r#"
                PRAGMA wal_autocheckpoint = 1000;
                PRAGMA cache_size = -16384;
                PRAGMA temp_store = MEMORY;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    #[instrument("applying database migrations", skip(self))]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Refresh planner statistics and close every connection.
    pub async fn close(&self) {
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_in_memory() {
        let db = Database::connect_in_memory().await.unwrap();
        assert!(!db.pool().is_closed());
        // Already applied, so a second run is a no-op.
        db.migrate().await.unwrap();
        db.close().await;
        assert!(db.pool().is_closed());
    }

    #[tokio::test]
    async fn test_connect_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirror.sqlite3");
        let db = Database::connect(&path, Some(2)).await.unwrap();
        assert!(path.exists());
        db.close().await;

        // Reopening an existing mirror keeps its contents.
        let db = Database::connect(&path, None).await.unwrap();
        let tables: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'projects'")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(tables, 1);
        db.close().await;
    }

    #[tokio::test]
    async fn test_triggers_are_installed() {
        let db = Database::connect_in_memory().await.unwrap();
        let triggers: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'trigger' ORDER BY name")
                .fetch_all(db.pool())
                .await
                .unwrap();
        assert_eq!(
            triggers,
            vec![
                "files_no_unyank",
                "projects_no_unyank",
                "projects_yank_cascade",
                "versions_no_unyank",
                "versions_yank_cascade",
            ]
        );
        db.close().await;
    }

    #[tokio::test]
    async fn test_connection_settings() {
        let db = Database::connect_in_memory().await.unwrap();
        let foreign_keys: i64 = sqlx::query_scalar("PRAGMA foreign_keys").fetch_one(db.pool()).await.unwrap();
        assert_eq!(foreign_keys, 1);
        let checkpoint: i64 = sqlx::query_scalar("PRAGMA wal_autocheckpoint").fetch_one(db.pool()).await.unwrap();
        assert_eq!(checkpoint, 1000);
        db.close().await;
    }
}
