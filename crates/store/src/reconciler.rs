//! Idempotent upserts of remote records into the catalogue.
//!
//! A [`Reconciler`] wraps one write transaction. Every upsert finds the row
//! by its identity; a live row is updated in place (only when something
//! changed), while a yanked row is deleted and created afresh so that a
//! revived entity never carries the state of its yanked predecessor.

use crate::digest::StoredContent;
use crate::error::{ErrorKind, Result};
use crate::models::{
    Classifier, ClassifierRow, File, FileColumns, FileRow, Project, ProjectRow, RequirementColumns,
    RequirementKind, Requirements, Version, VersionColumns, VersionMetadata, VersionRow,
};
use crate::{fetch, rank};
use exn::{OptionExt, ResultExt};
use sqlx::{Sqlite, Transaction};
use time::UtcDateTime;
use tracing::{debug, instrument};
use wharf_remote::{FileRecord, ReleaseRecord, Requirement, normalize};

pub struct Reconciler {
    pub(crate) tx: Transaction<'static, Sqlite>,
    now: UtcDateTime,
}

impl Reconciler {
    pub(crate) fn new(tx: Transaction<'static, Sqlite>, now: UtcDateTime) -> Self {
        Self { tx, now }
    }

    /// The timestamp written to every row touched by this transaction.
    pub fn now(&self) -> UtcDateTime {
        self.now
    }

    pub(crate) fn stamp(&self) -> i64 {
        self.now.unix_timestamp()
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.or_raise(|| ErrorKind::Database)
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await.or_raise(|| ErrorKind::Database)
    }

    pub(crate) async fn execute(&mut self, sql: &'static str, id: i64) -> Result<u64> {
        let result = sqlx::query(sql)
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_project(&mut self, name: impl AsRef<str>) -> Result<Option<Project>> {
        fetch::project(&mut *self.tx, &normalize(name)).await
    }

    pub async fn get_version(&mut self, project: &Project, version: &str) -> Result<Option<Version>> {
        fetch::version(&mut *self.tx, project.id, version).await
    }

    pub async fn list_versions(&mut self, project: &Project) -> Result<Vec<Version>> {
        fetch::versions(&mut *self.tx, project.id).await
    }

    pub async fn get_file(&mut self, filename: &str) -> Result<Option<File>> {
        fetch::file(&mut *self.tx, filename).await
    }

    pub async fn list_files(&mut self, version: &Version) -> Result<Vec<File>> {
        fetch::files(&mut *self.tx, version.id).await
    }

    // =========================================================================
    // Projects
    // =========================================================================

    /// Find or create the live project called `name`.
    ///
    /// Returns [`ErrorKind::Conflict`] if a live project with the same
    /// normalized name is stored under a different display name; display
    /// name changes go through [`rename_project`](Self::rename_project).
    #[instrument(level = "debug", skip(self))]
    pub async fn upsert_project(&mut self, name: &str) -> Result<Project> {
        let normalized = normalize(name);
        let existing = fetch::project(&mut *self.tx, &normalized).await?;
        match existing {
            Some(project) if !project.yanked => {
                if project.name != name {
                    exn::bail!(ErrorKind::Conflict(format!(
                        "project {normalized} is stored as {}, not {name}",
                        project.name
                    )));
                }
                return Ok(project);
            },
            Some(yanked) => {
                debug!(id = yanked.id, "recreating yanked project");
                self.execute(include_str!("../queries/delete_project.sql"), yanked.id).await?;
            },
            None => {},
        }
        let row: ProjectRow = sqlx::query_as(include_str!("../queries/insert_project.sql"))
            .bind(name)
            .bind(&normalized)
            .bind(self.stamp())
            .bind(self.stamp())
            .fetch_one(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Project::try_from(row)
    }

    // =========================================================================
    // Versions
    // =========================================================================

    /// Find, update or create `release` under `project`, then bring its
    /// requirements and classifiers in line with the record.
    #[instrument(level = "debug", skip_all, fields(project = %project.name, version = %release.version))]
    pub async fn upsert_version(&mut self, project: &Project, release: &ReleaseRecord) -> Result<Version> {
        let metadata = VersionMetadata::from(release);
        let existing = fetch::version(&mut *self.tx, project.id, &release.version).await?;
        let (version, created) = match existing {
            Some(version) if !version.yanked && version.metadata == metadata => (version, false),
            Some(version) if !version.yanked => {
                let row: VersionRow = bind_metadata(
                    sqlx::query_as(include_str!("../queries/update_version.sql")),
                    VersionColumns::try_from(&metadata)?,
                )
                .bind(self.stamp())
                .bind(version.id)
                .fetch_one(&mut *self.tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
                (Version::try_from(row)?, false)
            },
            other => {
                if let Some(yanked) = other {
                    debug!(id = yanked.id, "recreating yanked version");
                    self.execute(include_str!("../queries/delete_version.sql"), yanked.id).await?;
                }
                let query = sqlx::query_as(include_str!("../queries/insert_version.sql"))
                    .bind(project.id)
                    .bind(&release.version);
                let row: VersionRow = bind_metadata(query, VersionColumns::try_from(&metadata)?)
                    .bind(self.stamp())
                    .bind(self.stamp())
                    .fetch_one(&mut *self.tx)
                    .await
                    .or_raise(|| ErrorKind::Database)?;
                (Version::try_from(row)?, true)
            },
        };
        self.replace_requirements(&version, release).await?;
        self.assign_classifiers(&version, &release.classifiers).await?;
        if !created {
            return Ok(version);
        }
        self.rerank(project).await?;
        fetch::version(&mut *self.tx, project.id, &release.version)
            .await?
            .ok_or_raise(|| ErrorKind::NotFound(format!("version {} of {}", release.version, project.name)))
    }

    /// Authoritative `requires` replace everything stored. A record that
    /// declares none keeps the approximate `requires` inferred from an
    /// archive, and only its `provides` and `obsoletes` are replaced.
    async fn replace_requirements(&mut self, version: &Version, release: &ReleaseRecord) -> Result<()> {
        let incoming = Requirements {
            requires: release.requires.clone(),
            provides: release.provides.clone(),
            obsoletes: release.obsoletes.clone(),
        };
        let stored = fetch::requirements(&mut *self.tx, version.id).await?;
        if incoming.requires.is_empty() {
            let inferred_only = stored.requires.iter().all(|requirement| requirement.approximate);
            if inferred_only && stored.provides == incoming.provides && stored.obsoletes == incoming.obsoletes {
                return Ok(());
            }
            self.delete_requirements(version, Some(false)).await?;
            for kind in [RequirementKind::Provides, RequirementKind::Obsoletes] {
                self.insert_requirements(version, kind, incoming.get(kind)).await?;
            }
            return Ok(());
        }
        if stored == incoming {
            return Ok(());
        }
        self.delete_requirements(version, None).await?;
        for kind in RequirementKind::ALL {
            self.insert_requirements(version, kind, incoming.get(kind)).await?;
        }
        Ok(())
    }

    async fn delete_requirements(&mut self, version: &Version, approximate: Option<bool>) -> Result<()> {
        let query = match approximate {
            Some(approximate) => sqlx::query(include_str!("../queries/delete_requirements_by_approximation.sql"))
                .bind(version.id)
                .bind(approximate),
            None => sqlx::query(include_str!("../queries/delete_requirements.sql")).bind(version.id),
        };
        query.execute(&mut *self.tx).await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    async fn insert_requirements(
        &mut self,
        version: &Version,
        kind: RequirementKind,
        requirements: &[Requirement],
    ) -> Result<()> {
        for (position, requirement) in requirements.iter().enumerate() {
            let columns = RequirementColumns::try_from(requirement)?;
            sqlx::query(include_str!("../queries/insert_requirement.sql"))
                .bind(version.id)
                .bind(kind.as_str())
                .bind(i64::try_from(position).or_raise(|| ErrorKind::InvalidData("requirement position"))?)
                .bind(columns.name)
                .bind(columns.versions)
                .bind(columns.environment)
                .bind(columns.approximate)
                .execute(&mut *self.tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        Ok(())
    }

    /// Replace the approximate requirements of a version that declares no
    /// `requires` of its own. Returns `false` (and stores nothing) otherwise.
    #[instrument(level = "debug", skip_all, fields(version = %version.version, count = requirements.len()))]
    pub async fn set_approximate_requirements(&mut self, version: &Version, requirements: &[Requirement]) -> Result<bool> {
        let authoritative: i64 = sqlx::query_scalar(include_str!("../queries/count_authoritative_requirements.sql"))
            .bind(version.id)
            .fetch_one(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if authoritative > 0 {
            return Ok(false);
        }
        self.delete_requirements(version, Some(true)).await?;
        let approximate = requirements.iter().cloned().map(Requirement::approximate).collect::<Vec<_>>();
        self.insert_requirements(version, RequirementKind::Requires, &approximate).await?;
        Ok(true)
    }

    /// Link exactly `troves` to the version.
    async fn assign_classifiers(&mut self, version: &Version, troves: &[String]) -> Result<()> {
        let mut wanted = troves.to_vec();
        wanted.sort();
        wanted.dedup();
        if fetch::version_classifiers(&mut *self.tx, version.id).await? == wanted {
            return Ok(());
        }
        self.execute(include_str!("../queries/clear_version_classifiers.sql"), version.id).await?;
        for trove in &wanted {
            let classifier = self.get_or_create_classifier(trove).await?;
            sqlx::query(include_str!("../queries/link_version_classifier.sql"))
                .bind(version.id)
                .bind(classifier.id)
                .execute(&mut *self.tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        Ok(())
    }

    pub async fn get_or_create_classifier(&mut self, trove: &str) -> Result<Classifier> {
        sqlx::query(include_str!("../queries/insert_classifier.sql"))
            .bind(trove)
            .execute(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let row: ClassifierRow = sqlx::query_as(include_str!("../queries/get_classifier.sql"))
            .bind(trove)
            .fetch_one(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(row)
    }

    /// Recompute the rank of every version of `project`.
    pub async fn rerank(&mut self, project: &Project) -> Result<()> {
        let versions = fetch::versions(&mut *self.tx, project.id).await?;
        for (rank, id) in rank::ranked(&versions).into_iter().enumerate() {
            let rank = i64::try_from(rank).or_raise(|| ErrorKind::InvalidData("rank"))?;
            sqlx::query(include_str!("../queries/set_version_rank.sql"))
                .bind(rank)
                .bind(id)
                .bind(rank)
                .execute(&mut *self.tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        Ok(())
    }

    // =========================================================================
    // Files
    // =========================================================================

    /// Find, update or create `record` under `version`.
    ///
    /// A live file that is registered under another version is stale: file
    /// names never move between versions, so it is recreated.
    #[instrument(level = "debug", skip_all, fields(filename = %record.filename))]
    pub async fn upsert_file(&mut self, version: &Version, record: &FileRecord) -> Result<File> {
        let columns = FileColumns::try_from(record)?;
        let existing = fetch::file(&mut *self.tx, &record.filename).await?;
        let row: FileRow = match existing {
            Some(file) if !file.yanked && file.version_id == version.id => {
                if !file.differs_from(record) {
                    return Ok(file);
                }
                sqlx::query_as(include_str!("../queries/update_file.sql"))
                    .bind(columns.file_type)
                    .bind(columns.python_version)
                    .bind(columns.filesize)
                    .bind(columns.comment)
                    .bind(columns.url)
                    .bind(columns.md5_digest)
                    .bind(columns.uploaded_at)
                    .bind(self.stamp())
                    .bind(file.id)
                    .fetch_one(&mut *self.tx)
                    .await
                    .or_raise(|| ErrorKind::Database)?
            },
            other => {
                if let Some(stale) = other {
                    debug!(id = stale.id, yanked = stale.yanked, "recreating stale file");
                    self.execute(include_str!("../queries/delete_file.sql"), stale.id).await?;
                }
                sqlx::query_as(include_str!("../queries/insert_file.sql"))
                    .bind(version.id)
                    .bind(&record.filename)
                    .bind(columns.file_type)
                    .bind(columns.python_version)
                    .bind(columns.filesize)
                    .bind(columns.comment)
                    .bind(columns.url)
                    .bind(columns.md5_digest)
                    .bind(columns.uploaded_at)
                    .bind(self.stamp())
                    .bind(self.stamp())
                    .fetch_one(&mut *self.tx)
                    .await
                    .or_raise(|| ErrorKind::Database)?
            },
        };
        File::try_from(row)
    }

    /// Record the digests and content-store key of a body already saved by
    /// [`StoredContent::save`] against `file`.
    #[instrument(level = "debug", skip_all, fields(filename = %file.filename, key = %content.key))]
    pub async fn record_content(&mut self, file: &File, content: &StoredContent) -> Result<File> {
        let hashes = serde_json::to_string(&content.hashes).or_raise(|| ErrorKind::InvalidData("hashes"))?;
        let row: FileRow = sqlx::query_as(include_str!("../queries/set_file_content.sql"))
            .bind(hashes)
            .bind(&content.key)
            .bind(self.stamp())
            .bind(file.id)
            .fetch_one(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        File::try_from(row)
    }
}

type VersionQuery<'q> = sqlx::query::QueryAs<'q, Sqlite, VersionRow, sqlx::sqlite::SqliteArguments<'q>>;

/// Bind the metadata columns shared by the insert and update statements.
fn bind_metadata<'q>(query: VersionQuery<'q>, columns: VersionColumns) -> VersionQuery<'q> {
    query
        .bind(columns.summary)
        .bind(columns.description)
        .bind(columns.author)
        .bind(columns.author_email)
        .bind(columns.maintainer)
        .bind(columns.maintainer_email)
        .bind(columns.license)
        .bind(columns.requires_python)
        .bind(columns.download_uri)
        .bind(columns.keywords)
        .bind(columns.platforms)
        .bind(columns.uris)
        .bind(columns.requires_external)
        .bind(columns.requires_old)
        .bind(columns.provides_old)
        .bind(columns.obsoletes_old)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, Repository};
    use std::path::Path;
    use wharf_remote::mock;
    use wharf_storage::StorageBackend;
    use wharf_storage::backend::MockBackend;

    const HELLO_MD5: &str = "5d41402abc4b2a76b9719d911017c592";

    async fn setup() -> (Database, Repository) {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        (db, repo)
    }

    fn requirement(raw: &str) -> Requirement {
        raw.parse().unwrap()
    }

    #[tokio::test]
    async fn test_upsert_project_is_idempotent() {
        let (db, repo) = setup().await;
        let mut tx = repo.begin().await.unwrap();
        let first = tx.upsert_project("Foo_Bar").await.unwrap();
        let second = tx.upsert_project("Foo_Bar").await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.normalized, "foo-bar");
        assert_eq!(repo.list_live_projects().await.unwrap().len(), 1);
        db.close().await;
    }

    #[tokio::test]
    async fn test_upsert_project_display_name_conflict() {
        let (db, repo) = setup().await;
        let mut tx = repo.begin().await.unwrap();
        tx.upsert_project("Foo").await.unwrap();
        let err = tx.upsert_project("FOO").await.unwrap_err();
        assert!(matches!(*err, ErrorKind::Conflict(_)));
        drop(tx);
        db.close().await;
    }

    #[tokio::test]
    async fn test_yanked_project_is_recreated() {
        let (db, repo) = setup().await;
        let mut tx = repo.begin().await.unwrap();
        let project = tx.upsert_project("foo").await.unwrap();
        let version = tx.upsert_version(&project, &mock::release("foo", "1.0")).await.unwrap();
        tx.upsert_file(&version, &mock::file("foo-1.0.tar.gz", HELLO_MD5)).await.unwrap();
        assert!(tx.yank_project("foo").await.unwrap());
        assert!(tx.get_file("foo-1.0.tar.gz").await.unwrap().unwrap().yanked);

        let revived = tx.upsert_project("foo").await.unwrap();
        assert!(!revived.yanked);
        assert_ne!(revived.id, project.id);
        // The yanked predecessor took its yanked children with it.
        assert!(tx.list_versions(&revived).await.unwrap().is_empty());
        assert!(tx.get_file("foo-1.0.tar.gz").await.unwrap().is_none());
        tx.commit().await.unwrap();
        db.close().await;
    }

    #[tokio::test]
    async fn test_upsert_version_is_idempotent() {
        let (db, repo) = setup().await;
        let mut release = mock::release("foo", "1.0");
        release.summary = Some("Does things".to_string());
        release.classifiers = vec!["Topic :: Utilities".to_string()];
        release.requires = vec![requirement("bar (>=1.0)")];

        let mut tx = repo.begin().await.unwrap();
        let project = tx.upsert_project("foo").await.unwrap();
        let first = tx.upsert_version(&project, &release).await.unwrap();
        let second = tx.upsert_version(&project, &release).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.metadata.summary, "Does things");
        assert_eq!(first.metadata.license, "");
        assert_eq!(repo.list_versions(&project).await.unwrap().len(), 1);
        assert_eq!(repo.requirements(&first).await.unwrap().requires, release.requires);
        assert_eq!(repo.version_classifiers(&first).await.unwrap(), release.classifiers);
        assert_eq!(repo.list_classifiers().await.unwrap().len(), 1);
        db.close().await;
    }

    #[tokio::test]
    async fn test_upsert_version_updates_metadata() {
        let (db, repo) = setup().await;
        let mut release = mock::release("foo", "1.0");
        let mut tx = repo.begin().await.unwrap();
        let project = tx.upsert_project("foo").await.unwrap();
        let first = tx.upsert_version(&project, &release).await.unwrap();
        release.license = Some("MIT".to_string());
        let second = tx.upsert_version(&project, &release).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.metadata.license, "MIT");
        db.close().await;
    }

    #[tokio::test]
    async fn test_yanked_version_is_recreated() {
        let (db, repo) = setup().await;
        let mut tx = repo.begin().await.unwrap();
        let project = tx.upsert_project("foo").await.unwrap();
        let old = tx.upsert_version(&project, &mock::release("foo", "1.0")).await.unwrap();
        tx.yank_missing_versions(&project, &[]).await.unwrap();
        let new = tx.upsert_version(&project, &mock::release("foo", "1.0")).await.unwrap();
        tx.commit().await.unwrap();
        assert!(!new.yanked);
        assert_ne!(old.id, new.id);
        let versions = repo.list_versions(&project).await.unwrap();
        assert_eq!(versions, vec![new]);
        db.close().await;
    }

    #[tokio::test]
    async fn test_classifiers_are_replaced() {
        let (db, repo) = setup().await;
        let mut release = mock::release("foo", "1.0");
        release.classifiers = vec!["A :: B".to_string(), "C :: D".to_string()];
        let mut tx = repo.begin().await.unwrap();
        let project = tx.upsert_project("foo").await.unwrap();
        let version = tx.upsert_version(&project, &release).await.unwrap();
        release.classifiers = vec!["C :: D".to_string(), "E :: F".to_string()];
        tx.upsert_version(&project, &release).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(repo.version_classifiers(&version).await.unwrap(), vec!["C :: D", "E :: F"]);
        // Classifiers are shared and never deleted.
        assert_eq!(repo.list_classifiers().await.unwrap().len(), 3);
        db.close().await;
    }

    #[tokio::test]
    async fn test_get_or_create_classifier() {
        let (db, repo) = setup().await;
        let mut tx = repo.begin().await.unwrap();
        let first = tx.get_or_create_classifier("Topic :: Utilities").await.unwrap();
        let second = tx.get_or_create_classifier("Topic :: Utilities").await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(first, second);
        db.close().await;
    }

    #[tokio::test]
    async fn test_approximate_requirements_precedence() {
        let (db, repo) = setup().await;
        let release = mock::release("foo", "1.0");
        let mut tx = repo.begin().await.unwrap();
        let project = tx.upsert_project("foo").await.unwrap();
        let version = tx.upsert_version(&project, &release).await.unwrap();
        assert!(tx.set_approximate_requirements(&version, &[requirement("bar")]).await.unwrap());
        // Replaces the previous approximate set.
        assert!(tx.set_approximate_requirements(&version, &[requirement("baz")]).await.unwrap());
        // No authoritative requirements upstream: approximate ones survive.
        tx.upsert_version(&project, &release).await.unwrap();
        tx.commit().await.unwrap();

        let stored = repo.requirements(&version).await.unwrap();
        assert_eq!(stored.requires, vec![requirement("baz").approximate()]);

        let mut tx = repo.begin().await.unwrap();
        let mut authoritative = release.clone();
        authoritative.requires = vec![requirement("qux (>=2)")];
        tx.upsert_version(&project, &authoritative).await.unwrap();
        // Authoritative data blocks inference.
        assert!(!tx.set_approximate_requirements(&version, &[requirement("bar")]).await.unwrap());
        tx.commit().await.unwrap();

        let stored = repo.requirements(&version).await.unwrap();
        assert_eq!(stored.requires, vec![requirement("qux (>=2)")]);
        db.close().await;
    }

    #[tokio::test]
    async fn test_approximate_requirements_survive_other_relationships() {
        let (db, repo) = setup().await;
        let mut release = mock::release("foo", "1.0");
        let mut tx = repo.begin().await.unwrap();
        let project = tx.upsert_project("foo").await.unwrap();
        let version = tx.upsert_version(&project, &release).await.unwrap();
        assert!(tx.set_approximate_requirements(&version, &[requirement("six")]).await.unwrap());

        // Upstream starts declaring `provides` but still no `requires`.
        release.provides = vec![requirement("foo")];
        tx.upsert_version(&project, &release).await.unwrap();
        tx.upsert_version(&project, &release).await.unwrap();
        // Declared `provides` do not block inference either.
        assert!(tx.set_approximate_requirements(&version, &[requirement("six (>=1.10)")]).await.unwrap());
        tx.commit().await.unwrap();

        let stored = repo.requirements(&version).await.unwrap();
        assert_eq!(stored.requires, vec![requirement("six (>=1.10)").approximate()]);
        assert_eq!(stored.provides, vec![requirement("foo")]);

        let mut tx = repo.begin().await.unwrap();
        release.provides.clear();
        release.obsoletes = vec![requirement("oldfoo")];
        tx.upsert_version(&project, &release).await.unwrap();
        tx.commit().await.unwrap();

        let stored = repo.requirements(&version).await.unwrap();
        assert_eq!(stored.requires.len(), 1);
        assert!(stored.provides.is_empty());
        assert_eq!(stored.obsoletes, vec![requirement("oldfoo")]);
        db.close().await;
    }

    #[tokio::test]
    async fn test_ranks_recomputed_on_insert() {
        let (db, repo) = setup().await;
        let mut tx = repo.begin().await.unwrap();
        let project = tx.upsert_project("foo").await.unwrap();
        for number in ["2.0", "1.0", "nightly-build", "1.5b1"] {
            tx.upsert_version(&project, &mock::release("foo", number)).await.unwrap();
        }
        tx.commit().await.unwrap();
        let ordered = repo
            .list_versions(&project)
            .await
            .unwrap()
            .into_iter()
            .map(|version| (version.version, version.rank))
            .collect::<Vec<_>>();
        assert_eq!(
            ordered,
            vec![
                ("nightly-build".to_string(), 0),
                ("1.0".to_string(), 1),
                ("1.5b1".to_string(), 2),
                ("2.0".to_string(), 3),
            ]
        );
        db.close().await;
    }

    #[tokio::test]
    async fn test_upsert_file_is_idempotent() {
        let (db, repo) = setup().await;
        let record = mock::file("foo-1.0.tar.gz", HELLO_MD5);
        let mut tx = repo.begin().await.unwrap();
        let project = tx.upsert_project("foo").await.unwrap();
        let version = tx.upsert_version(&project, &mock::release("foo", "1.0")).await.unwrap();
        let first = tx.upsert_file(&version, &record).await.unwrap();
        let second = tx.upsert_file(&version, &record).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.md5_digest, HELLO_MD5);
        assert_eq!(repo.list_files(&version).await.unwrap().len(), 1);
        db.close().await;
    }

    #[tokio::test]
    async fn test_file_moved_between_versions_is_recreated() {
        let (db, repo) = setup().await;
        let record = mock::file("foo-1.0.tar.gz", HELLO_MD5);
        let mut tx = repo.begin().await.unwrap();
        let project = tx.upsert_project("foo").await.unwrap();
        let one = tx.upsert_version(&project, &mock::release("foo", "1.0")).await.unwrap();
        let two = tx.upsert_version(&project, &mock::release("foo", "2.0")).await.unwrap();
        let original = tx.upsert_file(&one, &record).await.unwrap();
        let moved = tx.upsert_file(&two, &record).await.unwrap();
        tx.commit().await.unwrap();
        assert_ne!(original.id, moved.id);
        assert_eq!(moved.version_id, two.id);
        assert!(repo.list_files(&one).await.unwrap().is_empty());
        db.close().await;
    }

    #[tokio::test]
    async fn test_record_content() {
        let (db, repo) = setup().await;
        let storage = MockBackend::default();
        let mut tx = repo.begin().await.unwrap();
        let project = tx.upsert_project("foo").await.unwrap();
        let version = tx.upsert_version(&project, &mock::release("foo", "1.0")).await.unwrap();
        let file = tx.upsert_file(&version, &mock::file("foo-1.0.tar.gz", HELLO_MD5)).await.unwrap();
        assert!(file.needs_download(HELLO_MD5));
        let content = StoredContent::save(&storage, &file.filename, b"hello").await.unwrap();
        let stored = tx.record_content(&file, &content).await.unwrap();
        tx.commit().await.unwrap();

        assert!(!stored.needs_download(HELLO_MD5));
        assert_eq!(stored.hashes.len(), 4);
        let key = stored.storage_key.clone().unwrap();
        assert!(key.ends_with("/foo-1.0.tar.gz"));
        assert!(storage.contains(Path::new(&key)).await.unwrap());
        assert_eq!(repo.get_file("foo-1.0.tar.gz").await.unwrap(), Some(stored));
        db.close().await;
    }
}
