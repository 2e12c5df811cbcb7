//! Turning the upstream change log into work.
//!
//! Renames are applied first, in one transaction, so that later entries
//! naming the new project find it. Whole-project removals are applied
//! directly without asking upstream about the project again. Everything
//! else collapses into at most one resynchronization job per project.

use crate::error::{ErrorKind, Result};
use crate::synchronizer::{Report, Synchronizer};
use crate::task::ProjectJob;
use exn::ResultExt;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};
use wharf_remote::{ChangeRecord, normalize};
use wharf_store::RenameOutcome;

/// What a change-log window asks of the rest of the batch.
pub(crate) struct Routed {
    pub jobs: Vec<ProjectJob>,
    /// The window removed at least one whole project, so upstream's project
    /// list is diffed once the jobs finish.
    pub deletions: bool,
}

/// A project removal and the pending entries it made redundant.
struct Removal {
    change: ChangeRecord,
    superseded: Vec<ChangeRecord>,
}

impl Synchronizer {
    /// Read the change log from `since` and apply renames and removals,
    /// returning the projects that still need resynchronizing.
    #[instrument(level = "debug", skip(self, report))]
    pub(crate) async fn route_changes(&self, since: Option<i64>, report: &mut Report) -> Result<Routed> {
        let changes = self.client.changes_since(since).await.or_raise(|| ErrorKind::Remote)?;
        let deletions = changes.iter().any(ChangeRecord::is_project_removal);
        info!(count = changes.len(), deletions, "read change log");

        let mut jobs: BTreeMap<String, ProjectJob> = BTreeMap::new();
        if since.is_some() {
            for (from, to) in self.apply_renames(&changes).await? {
                jobs.entry(normalize(&to)).or_insert_with(|| ProjectJob::new(&to));
                report.renamed.push((from, to));
            }
        }

        let mut removals = Vec::new();
        for change in changes {
            if self.repo.journal_contains(change.id).await.or_raise(|| ErrorKind::Journal)? {
                debug!(id = change.id, "change already applied");
                continue;
            }
            let key = normalize(&change.name);
            if change.is_project_removal() {
                let superseded = jobs.remove(&key).map(|job| job.changes).unwrap_or_default();
                removals.push(Removal { change, superseded });
                continue;
            }
            jobs.entry(key).or_insert_with(|| ProjectJob::new(&change.name)).changes.push(change);
        }

        self.apply_removals(removals, report).await?;
        Ok(Routed {
            jobs: jobs.into_values().collect(),
            deletions,
        })
    }

    /// Apply every rename in the batch, skipping ones already journalled.
    ///
    /// Returns the `(from, to)` pairs applied.
    async fn apply_renames(&self, changes: &[ChangeRecord]) -> Result<Vec<(String, String)>> {
        let renames = changes
            .iter()
            .filter_map(|change| change.renamed_from().map(|from| (from, change)))
            .collect::<Vec<_>>();
        if renames.is_empty() {
            return Ok(Vec::new());
        }

        let mut applied = Vec::new();
        let mut tx = self.repo.begin().await.or_raise(|| ErrorKind::Journal)?;
        for (from, change) in renames {
            if tx.journal_contains(change.id).await.or_raise(|| ErrorKind::Journal)? {
                continue;
            }
            match tx.rename_project(from, &change.name).await.or_raise(|| ErrorKind::Journal)? {
                RenameOutcome::Renamed(project) => {
                    tx.record_change(change).await.or_raise(|| ErrorKind::Journal)?;
                    info!(from, to = %project.name, "renamed project");
                    applied.push((from.to_string(), project.name));
                },
                RenameOutcome::UnknownSource => {
                    warn!(from, to = %change.name, "skipping rename of unknown project");
                },
                RenameOutcome::TargetTaken(project) => {
                    warn!(from, to = %change.name, existing = %project.name, "skipping rename onto existing project");
                },
            }
        }
        tx.commit().await.or_raise(|| ErrorKind::Journal)?;
        Ok(applied)
    }

    async fn apply_removals(&self, removals: Vec<Removal>, report: &mut Report) -> Result<()> {
        if removals.is_empty() {
            return Ok(());
        }
        let mut tx = self.repo.begin().await.or_raise(|| ErrorKind::Journal)?;
        for Removal { change, superseded } in &removals {
            if tx.yank_project(&change.name).await.or_raise(|| ErrorKind::Journal)? {
                info!(project = %change.name, "yanked removed project");
                report.yanked.push(change.name.clone());
            }
            for entry in std::iter::once(change).chain(superseded) {
                tx.record_change(entry).await.or_raise(|| ErrorKind::Journal)?;
            }
        }
        tx.commit().await.or_raise(|| ErrorKind::Journal)
    }
}
