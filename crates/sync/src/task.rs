//! Resynchronization of one project.
//!
//! A task runs in two phases. The fetch phase asks upstream for every
//! version, release record and file descriptor without touching the
//! database. File bodies it downloads go straight to the content store,
//! whose keys depend only on the bytes, and a source distribution is read
//! for requirements before its bytes are dropped. The apply phase then
//! reconciles all of it inside a single transaction, so a project either
//! moves to the new upstream state as a whole or not at all.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use futures::TryStreamExt;
use tracing::{debug, instrument};
use wharf_archive::approximate_requirements;
use wharf_remote::{ChangeRecord, FileRecord, MetadataClient, ReleaseRecord, Requirement};
use wharf_storage::StorageBackend;
use wharf_store::{Repository, StoredContent};

/// A project to resynchronize and the change-log entries that asked for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProjectJob {
    pub name: String,
    /// Journalled once the task commits.
    pub changes: Vec<ChangeRecord>,
}

impl ProjectJob {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            changes: Vec::new(),
        }
    }
}

/// Counts of what one task did, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskSummary {
    pub versions: usize,
    pub files: usize,
    pub downloaded: usize,
    /// Versions and files yanked.
    pub yanked: usize,
}

struct FetchedFile {
    record: FileRecord,
    content: Option<StoredContent>,
}

struct FetchedVersion {
    release: ReleaseRecord,
    files: Vec<FetchedFile>,
    /// Read from the version's source distributions.
    inferred: Vec<Requirement>,
}

pub(crate) struct ProjectTask<'a> {
    pub client: &'a dyn MetadataClient,
    pub repo: &'a Repository,
    pub storage: &'a dyn StorageBackend,
    /// `Some(force)` overrides the digest comparison.
    pub download: Option<bool>,
}

impl ProjectTask<'_> {
    #[instrument(level = "debug", skip_all, fields(project = %job.name))]
    pub async fn run(&self, job: &ProjectJob) -> Result<TaskSummary> {
        let versions = self.fetch(&job.name).await?;
        self.apply(job, versions).await
    }

    async fn fetch(&self, name: &str) -> Result<Vec<FetchedVersion>> {
        let numbers = self.client.list_versions(name).await.or_raise(|| ErrorKind::Remote)?;
        let mut fetched = Vec::with_capacity(numbers.len());
        for number in numbers {
            let release = self.client.fetch_release(name, &number).await.or_raise(|| ErrorKind::Remote)?;
            let records: Vec<FileRecord> =
                self.client.list_files(name, &number).try_collect().await.or_raise(|| ErrorKind::Remote)?;
            let mut files = Vec::with_capacity(records.len());
            let mut inferred = Vec::new();
            for record in records {
                let content = match self.fetch_body(&record).await? {
                    Some(bytes) => {
                        if record.file_type.is_source() && release.requires.is_empty() {
                            let found = infer_requirements(&record.filename, &bytes);
                            if !found.is_empty() {
                                inferred = found;
                            }
                        }
                        let content = StoredContent::save(self.storage, &record.filename, &bytes)
                            .await
                            .or_raise(|| ErrorKind::Storage)?;
                        Some(content)
                    },
                    None => None,
                };
                files.push(FetchedFile { record, content });
            }
            fetched.push(FetchedVersion {
                release,
                files,
                inferred,
            });
        }
        Ok(fetched)
    }

    /// The body of `record`, if it has to be (re)downloaded.
    async fn fetch_body(&self, record: &FileRecord) -> Result<Option<Vec<u8>>> {
        if !self.should_download(record).await? {
            return Ok(None);
        }
        debug!(filename = %record.filename, "downloading file");
        self.client.fetch_file_bytes(&record.url).await.or_raise(|| ErrorKind::Remote)
    }

    async fn should_download(&self, record: &FileRecord) -> Result<bool> {
        if let Some(force) = self.download {
            return Ok(force);
        }
        let stored = self.repo.get_file(&record.filename).await.or_raise(|| ErrorKind::Store)?;
        Ok(stored
            .filter(|file| !file.yanked)
            .is_none_or(|file| file.needs_download(&record.md5_digest)))
    }

    async fn apply(&self, job: &ProjectJob, versions: Vec<FetchedVersion>) -> Result<TaskSummary> {
        let mut summary = TaskSummary::default();
        let mut tx = self.repo.begin().await.or_raise(|| ErrorKind::Store)?;
        let project = tx.upsert_project(&job.name).await.or_raise(|| ErrorKind::Store)?;

        let mut upstream = Vec::with_capacity(versions.len());
        for FetchedVersion {
            release,
            files,
            inferred,
        } in versions
        {
            let version = tx.upsert_version(&project, &release).await.or_raise(|| ErrorKind::Store)?;
            let mut filenames = Vec::with_capacity(files.len());
            for FetchedFile { record, content } in files {
                let mut file = tx.upsert_file(&version, &record).await.or_raise(|| ErrorKind::Store)?;
                if let Some(content) = content {
                    file = tx.record_content(&file, &content).await.or_raise(|| ErrorKind::Store)?;
                    summary.downloaded += 1;
                }
                filenames.push(file.filename);
            }
            if !inferred.is_empty()
                && tx.set_approximate_requirements(&version, &inferred).await.or_raise(|| ErrorKind::Store)?
            {
                debug!(version = %version.version, count = inferred.len(), "stored approximate requirements");
            }
            summary.files += filenames.len();
            let yanked = tx.yank_missing_files(&version, &filenames).await.or_raise(|| ErrorKind::Store)?;
            summary.yanked += yanked.len();
            debug!(version = %version.version, files = filenames.len(), yanked = yanked.len(), "version reconciled");
            upstream.push(version.version);
        }
        summary.versions = upstream.len();
        summary.yanked += tx.yank_missing_versions(&project, &upstream).await.or_raise(|| ErrorKind::Store)?.len();

        for change in &job.changes {
            tx.record_change(change).await.or_raise(|| ErrorKind::Journal)?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Store)?;
        Ok(summary)
    }
}

/// The requirements a source distribution's setuptools metadata declares.
///
/// Archives that cannot be read, or carry no metadata, yield none.
fn infer_requirements(filename: &str, data: &[u8]) -> Vec<Requirement> {
    let lines = match approximate_requirements(filename, data) {
        Ok(lines) => lines,
        Err(err) => {
            debug!(filename, error = ?err, "source distribution not inspected");
            return Vec::new();
        },
    };
    lines
        .iter()
        .filter_map(|line| match line.parse::<Requirement>() {
            Ok(requirement) => Some(requirement.approximate()),
            Err(err) => {
                debug!(line, error = ?err, "skipping unparseable requirement");
                None
            },
        })
        .collect()
}
