//! The batch orchestrator.
//!
//! One [`Synchronizer::run`] is one batch:
//!
//! 1. The upstream clock is read before anything else; it becomes the new
//!    checkpoint if the batch completes.
//! 2. Classifiers are synchronized.
//! 3. The work set is built from the change log, an explicit project list,
//!    or the full upstream project listing.
//! 4. Project tasks run on a bounded pool, each under its project's lock,
//!    with the whole pool under the batch deadline.
//! 5. If upstream reports whole-project deletions since the last checkpoint,
//!    the local project list is diffed against upstream.
//! 6. The checkpoint is stored.

use crate::checkpoint::{CheckpointStore, SqliteCheckpointStore};
use crate::error::{ErrorKind, Result};
use crate::journal::Routed;
use crate::lock::{LockService, SqliteLockService, lock_key};
use crate::task::{ProjectJob, ProjectTask, TaskSummary};
use exn::ResultExt;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use wharf_config::{Config, SyncConfig};
use wharf_remote::{Endpoints, Fetcher, HttpOptions, HttpTransport, MetadataClient, normalize};
use wharf_storage::BackendHandle;
use wharf_storage::backend::LocalBackend;
use wharf_store::{Database, Repository};

/// Which projects a batch looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncMode {
    /// Follow the change log from `since`, or from the stored checkpoint
    /// when `since` is `None`.
    Journal { since: Option<i64> },
    /// Resynchronize exactly these projects. The checkpoint is left alone.
    Projects(Vec<String>),
    /// Resynchronize every project upstream lists and yank the rest.
    Full,
}

impl Display for SyncMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SyncMode::Journal { .. } => write!(f, "journal"),
            SyncMode::Projects(_) => write!(f, "projects"),
            SyncMode::Full => write!(f, "full"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    pub mode: SyncMode,
}

impl SyncRequest {
    /// Follow the change log from the stored checkpoint.
    pub fn journal() -> Self {
        Self::new(SyncMode::Journal { since: None })
    }

    pub fn since(checkpoint: i64) -> Self {
        Self::new(SyncMode::Journal {
            since: Some(checkpoint),
        })
    }

    pub fn projects<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(SyncMode::Projects(names.into_iter().map(Into::into).collect()))
    }

    pub fn full() -> Self {
        Self::new(SyncMode::Full)
    }

    pub fn new(mode: SyncMode) -> Self {
        Self { mode }
    }
}

/// What a batch did. Project names are upstream display names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    /// The checkpoint written at the end of the batch.
    pub checkpoint: Option<i64>,
    pub updated: Vec<String>,
    pub yanked: Vec<String>,
    /// `(from, to)` pairs.
    pub renamed: Vec<(String, String)>,
    /// Projects whose lock could not be taken in time.
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

impl Report {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

enum Outcome {
    Synced(TaskSummary),
    Skipped,
}

pub struct Synchronizer {
    pub(crate) client: Arc<dyn MetadataClient>,
    pub(crate) repo: Repository,
    storage: BackendHandle,
    locks: Arc<dyn LockService>,
    checkpoints: Arc<dyn CheckpointStore>,
    config: SyncConfig,
}

impl Synchronizer {
    /// A synchronizer whose locks and checkpoint live in the mirror database.
    pub fn new(client: Arc<dyn MetadataClient>, repo: Repository, storage: BackendHandle, config: SyncConfig) -> Self {
        let locks = Arc::new(SqliteLockService::new(repo.clone(), config.lock_poll()));
        let checkpoints = Arc::new(SqliteCheckpointStore::new(repo.clone()));
        Self {
            client,
            repo,
            storage,
            locks,
            checkpoints,
            config,
        }
    }

    /// Wire a synchronizer from configuration: the SQLite database, a local
    /// content store and the HTTP index client.
    pub async fn connect(config: &Config) -> Result<Self> {
        config.validate().or_raise(|| ErrorKind::Config)?;
        let db = Database::connect(&config.database.path, Some(config.database.max_connections))
            .await
            .or_raise(|| ErrorKind::Store)?;
        let mut backend = LocalBackend::new("local", &config.storage.root).or_raise(|| ErrorKind::Storage)?;
        if let Some(base_url) = config.storage.base_url().or_raise(|| ErrorKind::Config)? {
            backend = backend.with_base_url(base_url);
        }
        let endpoints =
            Endpoints::new(&config.remote.index_url, &config.remote.daytime_url).or_raise(|| ErrorKind::Config)?;
        let transport = HttpTransport::new(HttpOptions {
            endpoint: endpoints.index.clone(),
            user_agent: config.remote.user_agent.clone(),
            timeout: config.remote.timeout(),
        })
        .or_raise(|| ErrorKind::Remote)?;
        Ok(Self::new(
            Arc::new(Fetcher::new(transport, endpoints)),
            Repository::from(&db),
            Arc::new(backend),
            config.sync.clone(),
        ))
    }

    pub fn with_lock_service(mut self, locks: Arc<dyn LockService>) -> Self {
        self.locks = locks;
        self
    }

    pub fn with_checkpoint_store(mut self, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = checkpoints;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run one batch and fail if any project failed.
    ///
    /// The checkpoint is still advanced when some projects failed, since
    /// their journal entries were not recorded and replay on the next run.
    pub async fn run(&self, request: &SyncRequest) -> Result<Report> {
        let report = self.run_batch(request).await?;
        if !report.is_success() {
            exn::bail!(ErrorKind::Synchronization {
                failed: report.failed.clone()
            });
        }
        Ok(report)
    }

    /// Run one batch, collecting per-project failures into the report.
    ///
    /// Errors are reserved for failures that stop the batch: the deadline,
    /// the first failed project in "raise immediately" mode, and failures
    /// outside any single project.
    #[instrument(skip_all, fields(mode = %request.mode))]
    pub async fn run_batch(&self, request: &SyncRequest) -> Result<Report> {
        let clock = self.client.current_clock().await.or_raise(|| ErrorKind::Remote)?;
        let classifiers = self.sync_classifiers().await?;
        info!(clock, classifiers, "batch started");

        let mut report = Report::default();
        let Routed { jobs, deletions } = match &request.mode {
            SyncMode::Journal { since } => {
                let since = match since {
                    Some(since) => Some(*since),
                    None => self.checkpoints.get().await?,
                };
                self.route_changes(since, &mut report).await?
            },
            SyncMode::Projects(names) => {
                let mut jobs = BTreeMap::new();
                for name in names {
                    jobs.entry(normalize(name)).or_insert_with(|| ProjectJob::new(name));
                }
                Routed {
                    jobs: jobs.into_values().collect(),
                    deletions: false,
                }
            },
            SyncMode::Full => {
                let names = self.client.list_projects().await.or_raise(|| ErrorKind::Remote)?;
                report.yanked.extend(self.yank_missing_projects(&names).await?);
                Routed {
                    jobs: names.into_iter().map(ProjectJob::new).collect(),
                    deletions: false,
                }
            },
        };
        info!(projects = jobs.len(), "synchronizing projects");

        self.run_jobs(&jobs, &mut report).await?;

        if deletions {
            let names = self.client.list_projects().await.or_raise(|| ErrorKind::Remote)?;
            report.yanked.extend(self.yank_missing_projects(&names).await?);
        }

        let advances = !matches!(request.mode, SyncMode::Projects(_));
        if advances && self.config.store_checkpoint {
            self.checkpoints.set(clock).await?;
            report.checkpoint = Some(clock);
            info!(checkpoint = clock, "stored checkpoint");
        }

        info!(
            updated = report.updated.len(),
            yanked = report.yanked.len(),
            renamed = report.renamed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "batch finished"
        );
        Ok(report)
    }

    /// Run the same request forever, `every` apart. Failed batches are
    /// logged and retried on the next round.
    pub async fn run_forever(&self, request: &SyncRequest, every: Duration) {
        loop {
            if let Err(err) = self.run(request).await {
                error!(error = ?err, failed = ?err.failed_projects(), "batch failed");
            }
            tokio::time::sleep(every).await;
        }
    }

    async fn sync_classifiers(&self) -> Result<usize> {
        let troves = self.client.list_classifiers().await.or_raise(|| ErrorKind::Classifiers)?;
        let mut tx = self.repo.begin().await.or_raise(|| ErrorKind::Classifiers)?;
        for trove in &troves {
            tx.get_or_create_classifier(trove).await.or_raise(|| ErrorKind::Classifiers)?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Classifiers)?;
        Ok(troves.len())
    }

    async fn yank_missing_projects(&self, upstream: &BTreeSet<String>) -> Result<Vec<String>> {
        let mut tx = self.repo.begin().await.or_raise(|| ErrorKind::Store)?;
        let yanked = tx.yank_missing_projects(upstream).await.or_raise(|| ErrorKind::Store)?;
        tx.commit().await.or_raise(|| ErrorKind::Store)?;
        Ok(yanked)
    }

    /// Run every job under the batch deadline.
    async fn run_jobs(&self, jobs: &[ProjectJob], report: &mut Report) -> Result<()> {
        let mut pending = jobs.iter().map(|job| job.name.clone()).collect::<BTreeSet<_>>();
        let result = tokio::time::timeout(self.config.timeout(), self.drain(jobs, report, &mut pending)).await;
        match result {
            Ok(result) => result,
            Err(_) => {
                let mut failed = report.failed.clone();
                failed.extend(pending);
                error!(unfinished = ?failed, "batch deadline exceeded");
                exn::bail!(ErrorKind::Timeout { failed })
            },
        }
    }

    async fn drain(&self, jobs: &[ProjectJob], report: &mut Report, pending: &mut BTreeSet<String>) -> Result<()> {
        let mut futures: VecDeque<_> = jobs.iter().map(|job| self.sync_project(job)).collect();
        let mut processing = FuturesUnordered::new();
        processing.extend(futures.drain(..self.config.concurrency.max(1).min(futures.len())));
        while let Some((name, result)) = processing.next().await {
            pending.remove(&name);
            match result {
                Ok(Outcome::Synced(summary)) => {
                    info!(
                        project = %name,
                        versions = summary.versions,
                        files = summary.files,
                        downloaded = summary.downloaded,
                        yanked = summary.yanked,
                        "synchronized project"
                    );
                    report.updated.push(name);
                },
                Ok(Outcome::Skipped) => report.skipped.push(name),
                Err(err) => {
                    if self.config.raise_immediately {
                        return Err(err).or_raise(|| ErrorKind::Task(name));
                    }
                    error!(project = %name, error = ?err, "project synchronization failed");
                    report.failed.push(name);
                },
            }
            // Pop-n-push, but FIFO instead of LIFO.
            if let Some(next) = futures.pop_front() {
                processing.push(next);
            }
        }
        Ok(())
    }

    async fn sync_project(&self, job: &ProjectJob) -> (String, Result<Outcome>) {
        (job.name.clone(), self.sync_project_locked(job).await)
    }

    async fn sync_project_locked(&self, job: &ProjectJob) -> Result<Outcome> {
        let key = lock_key(&job.name);
        let lock = match self.locks.acquire(&key, self.config.lock_lease(), self.config.lock_wait()).await {
            Ok(lock) => lock,
            Err(err) if matches!(*err, ErrorKind::LockTimeout(_)) => {
                warn!(project = %job.name, key, "project is locked elsewhere, skipping");
                return Ok(Outcome::Skipped);
            },
            Err(err) => return Err(err),
        };
        let task = ProjectTask {
            client: &*self.client,
            repo: &self.repo,
            storage: &*self.storage,
            download: self.config.download,
        };
        let result = task.run(job).await;
        match self.locks.release(lock).await {
            Ok(true) => {},
            Ok(false) => warn!(project = %job.name, key, "lock lease expired before release"),
            Err(err) => warn!(project = %job.name, key, error = ?err, "failed to release lock"),
        }
        result.map(Outcome::Synced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CHECKPOINT_KEY;
    use crate::lock::Lock;
    use crate::testing::{Harness, config, md5};
    use async_trait::async_trait;
    use wharf_remote::mock::{file, release};

    /// A lock service that never grants anything.
    struct Contended;

    #[async_trait]
    impl LockService for Contended {
        async fn acquire(&self, key: &str, _lease: Duration, _wait: Duration) -> Result<Lock> {
            exn::bail!(ErrorKind::LockTimeout(key.to_string()))
        }

        async fn release(&self, _lock: Lock) -> Result<bool> {
            Ok(false)
        }
    }

    fn foo(h: &Harness) {
        h.index
            .set_clock(900)
            .add_release(release("Foo", "1.0"))
            .add_file("Foo", "1.0", file("Foo-1.0.tar.gz", &md5(b"hello")), b"hello");
    }

    #[tokio::test]
    async fn test_first_sync_mirrors_project() {
        let h = Harness::new().await;
        foo(&h);
        let report = h.synchronizer(config()).run(&SyncRequest::full()).await.unwrap();
        assert_eq!(report.updated, ["Foo"]);
        assert_eq!(report.checkpoint, Some(900));

        let project = h.repo.get_project("foo").await.unwrap().unwrap();
        assert_eq!(project.name, "Foo");
        assert_eq!(project.normalized, "foo");
        assert!(!project.yanked);
        let versions = h.repo.list_versions(&project).await.unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].version, "1.0");
        assert!(!versions[0].yanked);
        let files = h.repo.list_files(&versions[0]).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "Foo-1.0.tar.gz");
        assert_eq!(files[0].md5_digest, md5(b"hello"));
        assert!(!files[0].yanked);
        assert_eq!(h.storage.keys().await.len(), 1);
        assert_eq!(h.repo.get_checkpoint(CHECKPOINT_KEY).await.unwrap(), Some(900));
        h.db.close().await;
    }

    #[tokio::test]
    async fn test_file_missing_upstream_is_yanked() {
        let h = Harness::new().await;
        foo(&h);
        let synchronizer = h.synchronizer(config());
        synchronizer.run(&SyncRequest::full()).await.unwrap();
        h.index.remove_file("Foo", "1.0", "Foo-1.0.tar.gz");
        synchronizer.run(&SyncRequest::full()).await.unwrap();

        let project = h.repo.get_project("Foo").await.unwrap().unwrap();
        let version = h.repo.get_version(&project, "1.0").await.unwrap().unwrap();
        let files = h.repo.list_files(&version).await.unwrap();
        assert!(files[0].yanked);
        assert!(!version.yanked);
        assert!(!project.yanked);
        h.db.close().await;
    }

    #[tokio::test]
    async fn test_full_sync_yanks_projects_missing_upstream() {
        let h = Harness::new().await;
        foo(&h);
        h.index.add_release(release("Old", "0.1"));
        let synchronizer = h.synchronizer(config());
        synchronizer.run(&SyncRequest::full()).await.unwrap();

        h.index.remove_project("Old");
        let report = synchronizer.run(&SyncRequest::full()).await.unwrap();
        assert_eq!(report.yanked, ["Old"]);
        assert_eq!(report.updated, ["Foo"]);
        assert!(h.repo.get_project("Old").await.unwrap().unwrap().yanked);
        h.db.close().await;
    }

    #[tokio::test]
    async fn test_classifiers_are_synchronized_first() {
        let h = Harness::new().await;
        h.index.add_classifier("Topic :: Utilities").add_classifier("Framework :: Django");
        let mut tagged = release("Foo", "1.0");
        tagged.classifiers = vec!["Topic :: Utilities".into()];
        h.index.add_release(tagged);
        h.synchronizer(config()).run(&SyncRequest::full()).await.unwrap();

        let calls = h.index.calls();
        let classifiers = calls.iter().position(|call| call == "list_classifiers").unwrap();
        let versions = calls.iter().position(|call| call.starts_with("list_versions:")).unwrap();
        assert!(classifiers < versions);
        let troves = h.repo.list_classifiers().await.unwrap();
        let troves = troves.iter().map(|classifier| classifier.trove.as_str()).collect::<Vec<_>>();
        assert_eq!(troves, ["Framework :: Django", "Topic :: Utilities"]);
        h.db.close().await;
    }

    #[tokio::test]
    async fn test_explicit_projects_only() {
        let h = Harness::new().await;
        foo(&h);
        h.index.add_release(release("Bar", "1.0"));
        let report = h
            .synchronizer(config())
            .run(&SyncRequest::projects(["Foo", "Foo"]))
            .await
            .unwrap();
        assert_eq!(report.updated, ["Foo"]);
        assert_eq!(report.checkpoint, None);
        assert!(h.repo.get_project("Bar").await.unwrap().is_none());
        assert_eq!(h.repo.get_checkpoint(CHECKPOINT_KEY).await.unwrap(), None);
        h.db.close().await;
    }

    #[tokio::test]
    async fn test_failures_are_collected() {
        let h = Harness::new().await;
        h.index.set_clock(900).add_release(release("Bad", "1.0")).add_release(release("Good", "1.0")).fail_project("Bad");

        let err = h.synchronizer(config()).run(&SyncRequest::full()).await.unwrap_err();
        assert_eq!(
            *err,
            ErrorKind::Synchronization {
                failed: vec!["Bad".into()]
            }
        );
        assert!(h.repo.get_project("Good").await.unwrap().is_some());
        assert!(h.repo.get_project("Bad").await.unwrap().is_none());
        assert_eq!(h.repo.get_checkpoint(CHECKPOINT_KEY).await.unwrap(), Some(900));
        h.db.close().await;
    }

    #[tokio::test]
    async fn test_raise_immediately() {
        let h = Harness::new().await;
        h.index.set_clock(900).add_release(release("Bad", "1.0")).add_release(release("Good", "1.0")).fail_project("Bad");
        let config = SyncConfig {
            concurrency: 1,
            raise_immediately: true,
            ..config()
        };

        let err = h.synchronizer(config).run(&SyncRequest::full()).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Task("Bad".into()));
        assert!(h.repo.get_project("Good").await.unwrap().is_none());
        assert_eq!(h.repo.get_checkpoint(CHECKPOINT_KEY).await.unwrap(), None);
        h.db.close().await;
    }

    #[tokio::test]
    async fn test_queued_jobs_start_in_order() {
        let h = Harness::new().await;
        let names = ["A", "B", "C", "D", "E", "F"];
        for name in names {
            h.index.add_release(release(name, "1.0"));
        }
        let config = SyncConfig {
            concurrency: 1,
            ..config()
        };

        h.synchronizer(config).run(&SyncRequest::full()).await.unwrap();
        let started = h
            .index
            .calls()
            .into_iter()
            .filter_map(|call| call.strip_prefix("list_versions:").map(str::to_string))
            .collect::<Vec<_>>();
        assert_eq!(started, names);
        h.db.close().await;
    }

    #[tokio::test]
    async fn test_batch_timeout() {
        let h = Harness::new().await;
        h.index.set_clock(900).add_release(release("Slow", "1.0")).set_delay(Duration::from_millis(1_500));
        let config = SyncConfig {
            timeout_secs: 1,
            ..config()
        };

        let err = h.synchronizer(config).run(&SyncRequest::full()).await.unwrap_err();
        assert_eq!(
            *err,
            ErrorKind::Timeout {
                failed: vec!["Slow".into()]
            }
        );
        assert_eq!(h.repo.get_checkpoint(CHECKPOINT_KEY).await.unwrap(), None);
        h.db.close().await;
    }

    #[tokio::test]
    async fn test_locked_project_is_skipped() {
        let h = Harness::new().await;
        foo(&h);
        assert!(
            h.repo
                .try_acquire_lease(&lock_key("foo"), "elsewhere", Duration::from_secs(60))
                .await
                .unwrap()
        );
        let config = SyncConfig {
            lock_wait_secs: 0,
            ..config()
        };

        let report = h.synchronizer(config).run(&SyncRequest::full()).await.unwrap();
        assert_eq!(report.skipped, ["Foo"]);
        assert!(report.updated.is_empty());
        assert_eq!(h.calls("list_versions:"), 0);
        assert!(h.repo.get_project("Foo").await.unwrap().is_none());
        h.db.close().await;
    }

    #[tokio::test]
    async fn test_lock_released_after_task() {
        let h = Harness::new().await;
        foo(&h);
        h.synchronizer(config()).run(&SyncRequest::full()).await.unwrap();
        assert!(
            h.repo
                .try_acquire_lease(&lock_key("Foo"), "next", Duration::from_secs(60))
                .await
                .unwrap()
        );
        h.db.close().await;
    }

    #[tokio::test]
    async fn test_custom_lock_service() {
        let h = Harness::new().await;
        foo(&h);
        let report = h
            .synchronizer(config())
            .with_lock_service(Arc::new(Contended))
            .run(&SyncRequest::full())
            .await
            .unwrap();
        assert_eq!(report.skipped, ["Foo"]);
        h.db.close().await;
    }

    #[tokio::test]
    async fn test_checkpoint_is_clock_at_batch_start() {
        let h = Harness::new().await;
        foo(&h);
        h.index.set_clock(1_000).set_delay(Duration::from_millis(100));
        let synchronizer = h.synchronizer(config());

        let tick = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            h.index.set_clock(2_000);
        };
        let request = SyncRequest::full();
        let (report, ()) = tokio::join!(synchronizer.run(&request), tick);
        assert_eq!(report.unwrap().checkpoint, Some(1_000));
        assert_eq!(h.repo.get_checkpoint(CHECKPOINT_KEY).await.unwrap(), Some(1_000));
        h.db.close().await;
    }

    #[tokio::test]
    async fn test_checkpoint_not_stored_when_disabled() {
        let h = Harness::new().await;
        foo(&h);
        let config = SyncConfig {
            store_checkpoint: false,
            ..config()
        };
        let report = h.synchronizer(config).run(&SyncRequest::full()).await.unwrap();
        assert_eq!(report.checkpoint, None);
        assert_eq!(h.repo.get_checkpoint(CHECKPOINT_KEY).await.unwrap(), None);
        h.db.close().await;
    }

    #[tokio::test]
    async fn test_custom_checkpoint_store() {
        let h = Harness::new().await;
        foo(&h);
        let staging = Arc::new(SqliteCheckpointStore::with_key(h.repo.clone(), "staging"));
        h.synchronizer(config())
            .with_checkpoint_store(staging)
            .run(&SyncRequest::journal())
            .await
            .unwrap();
        assert_eq!(h.repo.get_checkpoint("staging").await.unwrap(), Some(900));
        assert_eq!(h.repo.get_checkpoint(CHECKPOINT_KEY).await.unwrap(), None);
        h.db.close().await;
    }

    #[tokio::test]
    async fn test_run_forever_repeats() {
        let h = Harness::new().await;
        foo(&h);
        let synchronizer = h.synchronizer(config());
        let request = SyncRequest::journal();
        let forever = synchronizer.run_forever(&request, Duration::from_millis(10));
        assert!(tokio::time::timeout(Duration::from_millis(300), forever).await.is_err());
        assert!(h.calls("current_clock") >= 2);
        h.db.close().await;
    }

    #[tokio::test]
    async fn test_concurrent_projects_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let h = Harness::on_disk(&dir.path().join("mirror.sqlite3")).await;
        h.index.set_clock(900);
        let names = (0..40).map(|n| format!("Project{n}")).collect::<Vec<_>>();
        for name in &names {
            for version in ["1.0", "1.1", "2.0"] {
                let filename = format!("{name}-{version}.tar.gz");
                let content = filename.as_bytes();
                h.index
                    .add_release(release(name, version))
                    .add_file(name, version, file(&filename, &md5(content)), content);
            }
        }
        let config = SyncConfig {
            concurrency: 10,
            ..config()
        };

        let report = h.synchronizer(config).run_batch(&SyncRequest::full()).await.unwrap();
        assert!(report.failed.is_empty(), "failed: {:?}", report.failed);
        assert_eq!(report.updated.len(), names.len());
        assert_eq!(h.repo.list_live_projects().await.unwrap().len(), names.len());
        assert_eq!(h.storage.keys().await.len(), names.len() * 3);
        h.db.close().await;
    }

    #[tokio::test]
    async fn test_connect_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.database.path = dir.path().join("mirror.sqlite3");
        config.storage.root = dir.path().join("packages");
        config.sync.concurrency = 4;

        let synchronizer = Synchronizer::connect(&config).await.unwrap();
        assert_eq!(synchronizer.config().concurrency, 4);
        assert!(config.database.path.exists());
        assert!(config.storage.root.is_dir());

        config.sync.concurrency = 0;
        let err = Synchronizer::connect(&config).await.err().unwrap();
        assert_eq!(*err, ErrorKind::Config);
    }

    #[test]
    fn test_sync_mode_display() {
        assert_eq!(SyncRequest::journal().mode.to_string(), "journal");
        assert_eq!(SyncRequest::since(5).mode, SyncMode::Journal { since: Some(5) });
        assert_eq!(SyncRequest::projects(["Foo"]).mode.to_string(), "projects");
        assert_eq!(SyncRequest::full().mode.to_string(), "full");
    }
}
