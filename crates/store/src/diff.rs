//! Set-based soft deletion and journal bookkeeping.
//!
//! Each `yank_missing_*` operation compares the live local children of one
//! parent against the identities upstream currently reports and yanks the
//! difference. Yanking cascades downwards through database triggers.

use crate::Reconciler;
use crate::error::{ErrorKind, Result};
use crate::models::{Project, ProjectRow, Version};
use crate::fetch;
use exn::ResultExt;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info, instrument};
use wharf_remote::{ChangeRecord, normalize};

/// Result of applying an upstream rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed(Project),
    /// No live project is known under the previous name.
    UnknownSource,
    /// A different live project already owns the new name.
    TargetTaken(Project),
}

impl Reconciler {
    /// Yank every live project whose name upstream no longer lists.
    ///
    /// Returns the display names of the projects yanked.
    #[instrument(level = "debug", skip_all, fields(upstream = upstream.len()))]
    pub async fn yank_missing_projects(&mut self, upstream: &BTreeSet<String>) -> Result<Vec<String>> {
        let wanted = upstream.iter().map(normalize).collect::<HashSet<_>>();
        let mut yanked = Vec::new();
        for project in fetch::live_projects(&mut *self.tx).await? {
            if wanted.contains(&project.normalized) {
                continue;
            }
            self.yank(include_str!("../queries/yank_project.sql"), project.id).await?;
            info!(project = %project.name, "yanked project missing upstream");
            yanked.push(project.name);
        }
        Ok(yanked)
    }

    /// Yank every live version of `project` that upstream no longer lists.
    ///
    /// Returns the version strings yanked.
    #[instrument(level = "debug", skip_all, fields(project = %project.name))]
    pub async fn yank_missing_versions(&mut self, project: &Project, upstream: &[String]) -> Result<Vec<String>> {
        let live = fetch::versions(&mut *self.tx, project.id)
            .await?
            .into_iter()
            .filter(|version| !version.yanked)
            .collect::<Vec<_>>();
        if upstream.is_empty() {
            sqlx::query(include_str!("../queries/yank_all_versions.sql"))
                .bind(self.stamp())
                .bind(project.id)
                .execute(&mut *self.tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
            return Ok(live.into_iter().map(|version| version.version).collect());
        }
        let wanted = upstream.iter().collect::<HashSet<_>>();
        let mut yanked = Vec::new();
        for version in live {
            if wanted.contains(&version.version) {
                continue;
            }
            self.yank(include_str!("../queries/yank_version.sql"), version.id).await?;
            debug!(version = %version.version, "yanked version");
            yanked.push(version.version);
        }
        Ok(yanked)
    }

    /// Yank every live file of `version` that upstream no longer lists.
    ///
    /// Returns the filenames yanked.
    #[instrument(level = "debug", skip_all, fields(version = %version.version))]
    pub async fn yank_missing_files(&mut self, version: &Version, upstream: &[String]) -> Result<Vec<String>> {
        let live = fetch::files(&mut *self.tx, version.id)
            .await?
            .into_iter()
            .filter(|file| !file.yanked)
            .collect::<Vec<_>>();
        if upstream.is_empty() {
            sqlx::query(include_str!("../queries/yank_all_files.sql"))
                .bind(self.stamp())
                .bind(version.id)
                .execute(&mut *self.tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
            return Ok(live.into_iter().map(|file| file.filename).collect());
        }
        let wanted = upstream.iter().collect::<HashSet<_>>();
        let mut yanked = Vec::new();
        for file in live {
            if wanted.contains(&file.filename) {
                continue;
            }
            self.yank(include_str!("../queries/yank_file.sql"), file.id).await?;
            debug!(filename = %file.filename, "yanked file");
            yanked.push(file.filename);
        }
        Ok(yanked)
    }

    /// Yank a whole project by any spelling of its name.
    ///
    /// Returns `false` if no live project goes by that name.
    #[instrument(level = "debug", skip(self))]
    pub async fn yank_project(&mut self, name: &str) -> Result<bool> {
        let Some(project) = fetch::project(&mut *self.tx, &normalize(name)).await? else {
            return Ok(false);
        };
        if project.yanked {
            return Ok(false);
        }
        Ok(self.yank(include_str!("../queries/yank_project.sql"), project.id).await? > 0)
    }

    async fn yank(&mut self, sql: &'static str, id: i64) -> Result<u64> {
        let result = sqlx::query(sql)
            .bind(self.stamp())
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected())
    }

    /// Move the live project known as `from` to the display name `to`.
    ///
    /// A yanked project already holding the new name is replaced.
    #[instrument(level = "debug", skip(self))]
    pub async fn rename_project(&mut self, from: &str, to: &str) -> Result<RenameOutcome> {
        let source = fetch::project(&mut *self.tx, &normalize(from)).await?;
        let Some(source) = source.filter(|project| !project.yanked) else {
            return Ok(RenameOutcome::UnknownSource);
        };
        let normalized = normalize(to);
        if normalized != source.normalized {
            let target = fetch::project(&mut *self.tx, &normalized).await?;
            match target {
                Some(target) if !target.yanked => return Ok(RenameOutcome::TargetTaken(target)),
                Some(target) => {
                    self.execute(include_str!("../queries/delete_project.sql"), target.id).await?;
                },
                None => {},
            }
        }
        let row: ProjectRow = sqlx::query_as(include_str!("../queries/rename_project.sql"))
            .bind(to)
            .bind(&normalized)
            .bind(self.stamp())
            .bind(source.id)
            .fetch_one(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(RenameOutcome::Renamed(Project::try_from(row)?))
    }

    pub async fn journal_contains(&mut self, remote_id: i64) -> Result<bool> {
        sqlx::query_scalar(include_str!("../queries/journal_contains.sql"))
            .bind(remote_id)
            .fetch_one(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// Record an upstream change in the journal.
    ///
    /// Returns `false` if a change with the same sequence id is already
    /// recorded.
    pub async fn record_change(&mut self, change: &ChangeRecord) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/insert_journal.sql"))
            .bind(&change.name)
            .bind(&change.version)
            .bind(change.action.to_string())
            .bind(change.timestamp)
            .bind(change.id)
            .execute(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() == 1)
    }
}
