//! In-memory [`MetadataClient`] for tests of code that drives the client.
//!
//! Records are stored already validated. Every method takes `&self` so a
//! test can reshape the "upstream" between two synchronization runs while
//! the index is shared behind an `Arc`.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use time::UtcDateTime;

use crate::client::{FileStream, MetadataClient, secure_url};
use crate::error::{ErrorKind, Result};
use crate::models::{Action, ChangeRecord, FileRecord, FileType, ReleaseRecord};

/// A minimal release record.
pub fn release(name: &str, version: &str) -> ReleaseRecord {
    ReleaseRecord {
        name: name.to_string(),
        version: version.to_string(),
        ..ReleaseRecord::default()
    }
}

/// A minimal source distribution descriptor served from `files.example.com`.
pub fn file(filename: &str, md5_digest: &str) -> FileRecord {
    FileRecord {
        filename: filename.to_string(),
        url: format!("http://files.example.com/{filename}"),
        file_type: if filename.ends_with(".whl") {
            FileType::BdistWheel
        } else {
            FileType::Sdist
        },
        python_version: "source".to_string(),
        md5_digest: md5_digest.to_string(),
        filesize: 0,
        created: UtcDateTime::UNIX_EPOCH,
        comment: None,
    }
}

/// A change-log entry.
pub fn change(id: i64, name: &str, version: Option<&str>, timestamp: i64, action: Action) -> ChangeRecord {
    ChangeRecord {
        name: name.to_string(),
        version: version.map(str::to_string),
        timestamp,
        action,
        id,
    }
}

#[derive(Default)]
struct State {
    // Project name to its versions in upstream order.
    projects: BTreeMap<String, Vec<(ReleaseRecord, Vec<FileRecord>)>>,
    contents: HashMap<String, Vec<u8>>,
    classifiers: Vec<String>,
    changes: Vec<ChangeRecord>,
    clock: i64,
    failing: HashSet<String>,
    delay: Option<Duration>,
    calls: Vec<String>,
}

#[derive(Default)]
pub struct MockIndex {
    state: Mutex<State>,
}

impl MockIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A test that panicked while holding the lock already failed.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: String) {
        self.state().calls.push(call);
    }

    pub fn add_project(&self, name: &str) -> &Self {
        self.state().projects.entry(name.to_string()).or_default();
        self
    }

    /// Adds (or replaces) a version of `release.name`.
    pub fn add_release(&self, release: ReleaseRecord) -> &Self {
        let mut state = self.state();
        let versions = state.projects.entry(release.name.clone()).or_default();
        match versions.iter_mut().find(|(existing, _)| existing.version == release.version) {
            Some((existing, _)) => *existing = release,
            None => versions.push((release, Vec::new())),
        }
        self
    }

    /// Adds (or replaces) a file of an existing version, serving `content`
    /// from the file's URL upgraded to https.
    pub fn add_file(&self, project: &str, version: &str, file: FileRecord, content: &[u8]) -> &Self {
        let mut state = self.state();
        if let Ok(url) = secure_url(&file.url) {
            state.contents.insert(url.to_string(), content.to_vec());
        }
        if let Some((_, files)) = state
            .projects
            .get_mut(project)
            .and_then(|versions| versions.iter_mut().find(|(release, _)| release.version == version))
        {
            files.retain(|existing| existing.filename != file.filename);
            files.push(file);
        }
        self
    }

    pub fn remove_file(&self, project: &str, version: &str, filename: &str) -> &Self {
        if let Some((_, files)) = self
            .state()
            .projects
            .get_mut(project)
            .and_then(|versions| versions.iter_mut().find(|(release, _)| release.version == version))
        {
            files.retain(|file| file.filename != filename);
        }
        self
    }

    pub fn remove_version(&self, project: &str, version: &str) -> &Self {
        if let Some(versions) = self.state().projects.get_mut(project) {
            versions.retain(|(release, _)| release.version != version);
        }
        self
    }

    pub fn remove_project(&self, project: &str) -> &Self {
        self.state().projects.remove(project);
        self
    }

    /// Moves a project to a new name, rewriting the names in its releases.
    pub fn rename_project(&self, from: &str, to: &str) -> &Self {
        let mut state = self.state();
        if let Some(mut versions) = state.projects.remove(from) {
            for (release, _) in &mut versions {
                release.name = to.to_string();
            }
            state.projects.insert(to.to_string(), versions);
        }
        self
    }

    pub fn add_classifier(&self, trove: &str) -> &Self {
        self.state().classifiers.push(trove.to_string());
        self
    }

    pub fn push_change(&self, change: ChangeRecord) -> &Self {
        self.state().changes.push(change);
        self
    }

    pub fn set_clock(&self, clock: i64) -> &Self {
        self.state().clock = clock;
        self
    }

    /// Makes every version listing for `project` fail with a transport error.
    pub fn fail_project(&self, project: &str) -> &Self {
        self.state().failing.insert(project.to_string());
        self
    }

    /// Delays every version listing, to exercise locks and deadlines.
    pub fn set_delay(&self, delay: Duration) -> &Self {
        self.state().delay = Some(delay);
        self
    }

    /// Every call made so far, as `method:argument` strings.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }
}

#[async_trait]
impl MetadataClient for MockIndex {
    async fn list_projects(&self) -> Result<BTreeSet<String>> {
        self.record("list_projects".to_string());
        Ok(self.state().projects.keys().cloned().collect())
    }

    async fn list_versions(&self, project: &str) -> Result<Vec<String>> {
        self.record(format!("list_versions:{project}"));
        let delay = self.state().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let state = self.state();
        if state.failing.contains(project) {
            exn::bail!(ErrorKind::Transport(format!("package_releases({project})")));
        }
        Ok(state
            .projects
            .get(project)
            .map(|versions| versions.iter().map(|(release, _)| release.version.clone()).collect())
            .unwrap_or_default())
    }

    async fn fetch_release(&self, project: &str, version: &str) -> Result<ReleaseRecord> {
        self.record(format!("fetch_release:{project}/{version}"));
        let state = self.state();
        let found = state
            .projects
            .get(project)
            .and_then(|versions| versions.iter().find(|(release, _)| release.version == version));
        match found {
            Some((release, _)) => Ok(release.clone()),
            None => exn::bail!(ErrorKind::Status(404)),
        }
    }

    fn list_files<'a>(&'a self, project: &'a str, version: &'a str) -> FileStream<'a> {
        Box::pin(stream! {
            self.record(format!("list_files:{project}/{version}"));
            let files = self
                .state()
                .projects
                .get(project)
                .and_then(|versions| versions.iter().find(|(release, _)| release.version == version))
                .map(|(_, files)| files.clone())
                .unwrap_or_default();
            for file in files {
                yield Ok(file);
            }
        })
    }

    async fn fetch_file_bytes(&self, url: &str) -> Result<Option<Vec<u8>>> {
        let url = secure_url(url)?;
        self.record(format!("fetch_file_bytes:{url}"));
        match self.state().contents.get(url.as_str()) {
            Some(content) => Ok(Some(content.clone())),
            None => exn::bail!(ErrorKind::Status(404)),
        }
    }

    async fn list_classifiers(&self) -> Result<Vec<String>> {
        self.record("list_classifiers".to_string());
        Ok(self.state().classifiers.clone())
    }

    async fn changes_since(&self, checkpoint: Option<i64>) -> Result<Vec<ChangeRecord>> {
        self.record(format!("changes_since:{}", checkpoint.unwrap_or_default()));
        let since = match checkpoint {
            Some(since) if since > 0 => since - 1,
            _ => 0,
        };
        Ok(self.state().changes.iter().filter(|change| change.timestamp >= since).cloned().collect())
    }

    async fn current_clock(&self) -> Result<i64> {
        self.record("current_clock".to_string());
        Ok(self.state().clock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn test_mock_index_serves_what_it_holds() {
        let index = MockIndex::new();
        index
            .add_release(release("Foo", "1.0"))
            .add_file("Foo", "1.0", file("Foo-1.0.tar.gz", "aabcd"), b"content")
            .add_project("Empty");

        assert_eq!(index.list_projects().await.unwrap().len(), 2);
        assert_eq!(index.list_versions("Foo").await.unwrap(), vec!["1.0"]);
        let files: Vec<_> = index.list_files("Foo", "1.0").try_collect().await.unwrap();
        assert_eq!(files[0].filename, "Foo-1.0.tar.gz");
        let content = index.fetch_file_bytes(&files[0].url).await.unwrap();
        assert_eq!(content.as_deref(), Some(&b"content"[..]));

        index.remove_file("Foo", "1.0", "Foo-1.0.tar.gz");
        let files: Vec<_> = index.list_files("Foo", "1.0").try_collect().await.unwrap();
        assert!(files.is_empty());
        assert!(index.calls().contains(&"list_versions:Foo".to_string()));
    }

    #[tokio::test]
    async fn test_mock_index_rename_and_failure() {
        let index = MockIndex::new();
        index.add_release(release("Qux", "1.0")).rename_project("Qux", "Baz").fail_project("Bad");
        assert_eq!(index.fetch_release("Baz", "1.0").await.unwrap().name, "Baz");
        assert!(index.list_versions("Bad").await.unwrap_err().is_retryable());
    }
}
