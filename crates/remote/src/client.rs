use std::collections::BTreeSet;
use std::pin::Pin;

use async_stream::stream;
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use futures::Stream;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::error::{ErrorKind, Result};
use crate::models::{ChangeRecord, FileRecord, ReleaseRecord};
use crate::transport::{DEFAULT_DAYTIME_URL, DEFAULT_INDEX_URL, Transport};
use crate::validate::{self, parse_timestamp};

/// Lazily validated file descriptors for one version.
pub type FileStream<'a> = Pin<Box<dyn Stream<Item = Result<FileRecord>> + Send + 'a>>;

/// Read access to the upstream index. Every payload is validated and mapped
/// onto local field names before it is returned.
#[async_trait]
pub trait MetadataClient: Send + Sync {
    /// Every project name upstream knows about.
    async fn list_projects(&self) -> Result<BTreeSet<String>>;

    /// Versions of `project`, hidden ones included, in upstream order.
    async fn list_versions(&self, project: &str) -> Result<Vec<String>>;

    async fn fetch_release(&self, project: &str, version: &str) -> Result<ReleaseRecord>;

    /// Distribution files of one version. Every call fetches afresh, so the
    /// stream can be restarted by calling again.
    fn list_files<'a>(&'a self, project: &'a str, version: &'a str) -> FileStream<'a>;

    /// Downloads a file. The URL is always upgraded to `https`. `Ok(None)`
    /// means the server reported the content as not modified.
    async fn fetch_file_bytes(&self, url: &str) -> Result<Option<Vec<u8>>>;

    async fn list_classifiers(&self) -> Result<Vec<String>>;

    /// Change-log entries recorded since `checkpoint` (the whole log when
    /// absent).
    async fn changes_since(&self, checkpoint: Option<i64>) -> Result<Vec<ChangeRecord>>;

    /// Whether any whole-project removal was recorded since `checkpoint`.
    async fn has_deletions_since(&self, checkpoint: Option<i64>) -> Result<bool> {
        Ok(self.changes_since(checkpoint).await?.iter().any(ChangeRecord::is_project_removal))
    }

    /// Upstream's clock, in epoch seconds.
    async fn current_clock(&self) -> Result<i64>;
}

/// Where a [`Fetcher`] finds the plain-text endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub index: Url,
    pub daytime: Url,
}

impl Endpoints {
    pub fn new(index: &str, daytime: &str) -> Result<Self> {
        Ok(Endpoints {
            index: Url::parse(index).or_raise(|| ErrorKind::InvalidUrl(index.to_string()))?,
            daytime: Url::parse(daytime).or_raise(|| ErrorKind::InvalidUrl(daytime.to_string()))?,
        })
    }

    /// The public index.
    pub fn pypi() -> Result<Self> {
        Endpoints::new(DEFAULT_INDEX_URL, DEFAULT_DAYTIME_URL)
    }

    fn classifiers(&self) -> Url {
        let mut url = self.index.clone();
        url.set_query(Some(":action=list_classifiers"));
        url
    }
}

/// Rewrites the scheme of `raw` to `https`.
pub fn secure_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw).or_raise(|| ErrorKind::InvalidUrl(raw.to_string()))?;
    if url.scheme() != "https" && url.set_scheme("https").is_err() {
        exn::bail!(ErrorKind::InvalidUrl(raw.to_string()));
    }
    Ok(url)
}

/// [`MetadataClient`] over any [`Transport`].
pub struct Fetcher<T> {
    transport: T,
    endpoints: Endpoints,
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T, endpoints: Endpoints) -> Self {
        Fetcher { transport, endpoints }
    }

    async fn text(&self, url: &Url) -> Result<Option<String>> {
        match self.transport.get(url).await? {
            Some(bytes) => Ok(Some(String::from_utf8(bytes).or_raise(|| ErrorKind::Decode)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl<T: Transport> MetadataClient for Fetcher<T> {
    #[instrument(skip(self))]
    async fn list_projects(&self) -> Result<BTreeSet<String>> {
        debug!("fetching all projects");
        validate::project_list(self.transport.call("list_packages", vec![]).await?)
    }

    #[instrument(skip(self))]
    async fn list_versions(&self, project: &str) -> Result<Vec<String>> {
        debug!("fetching versions");
        let params = vec![Value::from(project), Value::from(true)];
        validate::version_list(self.transport.call("package_releases", params).await?)
    }

    #[instrument(skip(self))]
    async fn fetch_release(&self, project: &str, version: &str) -> Result<ReleaseRecord> {
        debug!("fetching release data");
        let params = vec![Value::from(project), Value::from(version)];
        validate::release(self.transport.call("release_data", params).await?)
    }

    fn list_files<'a>(&'a self, project: &'a str, version: &'a str) -> FileStream<'a> {
        Box::pin(stream! {
            debug!(project, version, "fetching distribution files");
            let params = vec![Value::from(project), Value::from(version)];
            let payload = match self.transport.call("release_urls", params).await {
                Ok(payload) => payload,
                Err(err) => {
                    yield Err(err);
                    return;
                },
            };
            match payload {
                Value::Array(items) => {
                    for item in items {
                        yield validate::file(item);
                    }
                },
                other => yield Err(ErrorKind::invalid("file list", "payload", other).into()),
            }
        })
    }

    #[instrument(skip(self))]
    async fn fetch_file_bytes(&self, url: &str) -> Result<Option<Vec<u8>>> {
        let url = secure_url(url)?;
        debug!(%url, "fetching file");
        self.transport.get(&url).await
    }

    #[instrument(skip(self))]
    async fn list_classifiers(&self) -> Result<Vec<String>> {
        debug!("fetching classifiers");
        let text = self.text(&self.endpoints.classifiers()).await?.unwrap_or_default();
        Ok(text.lines().map(str::trim).filter(|line| !line.is_empty()).map(str::to_string).collect())
    }

    #[instrument(skip(self))]
    async fn changes_since(&self, checkpoint: Option<i64>) -> Result<Vec<ChangeRecord>> {
        // Step back one second so entries stamped on the boundary are seen
        // again; journal dedup absorbs the overlap.
        let since = match checkpoint {
            Some(since) if since > 0 => since - 1,
            _ => 0,
        };
        debug!(since, "fetching change log");
        let params = vec![Value::from(since), Value::from(true)];
        validate::changelog(self.transport.call("changelog", params).await?)
    }

    #[instrument(skip(self))]
    async fn current_clock(&self) -> Result<i64> {
        let text = self.text(&self.endpoints.daytime).await?.ok_or_raise(|| ErrorKind::Decode)?;
        let clock = parse_timestamp(&text).ok_or_raise(|| ErrorKind::invalid("daytime", "timestamp", text.trim()))?;
        Ok(clock.unix_timestamp())
    }
}
