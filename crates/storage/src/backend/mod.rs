//! The content-store contract and its implementations.

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
use crate::error::{ErrorKind, Result};
use crate::key::{content_key, validate_key};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

/// Where the synchronizer puts downloaded file bytes.
///
/// Keys are relative paths; implementations pass every key through
/// [`validate_key`](crate::validate_key) before touching storage.
///
/// ```
/// use wharf_storage::{backend::StorageBackend, error::Result};
///
/// async fn publish(backend: &dyn StorageBackend, filename: &str, bytes: &[u8]) -> Result<String> {
///     let key = backend.save(filename, bytes).await?;
///     backend.url(&key)
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend, for logging.
    fn name(&self) -> &str;

    async fn contains(&self, key: &Path) -> Result<bool>;

    /// Fails with [`Missing`](ErrorKind::Missing) for an unknown key.
    async fn get(&self, key: &Path) -> Result<Vec<u8>>;

    /// Store `data` under `key`, replacing what was there. Readers never see
    /// a partially written key.
    async fn put(&self, key: &Path, data: &[u8]) -> Result<()>;

    /// Where clients can download `key` from.
    fn url(&self, key: &Path) -> Result<String>;

    /// Store `data` under its [content key](crate::content_key) and return
    /// the key. Bytes already present are not written again.
    async fn save(&self, filename: &str, data: &[u8]) -> Result<PathBuf> {
        let key = content_key(filename, data)?;
        if self.contains(&key).await? {
            debug!(backend = self.name(), key = %key.display(), "content already stored");
            return Ok(key);
        }
        self.put(&key, data).await?;
        debug!(backend = self.name(), key = %key.display(), size = data.len(), "stored content");
        Ok(key)
    }
}

/// `base` with each component of `key` appended as an escaped path segment.
pub(crate) fn join_url(base: &Url, key: &Path) -> Result<String> {
    let key = validate_key(key)?;
    let mut url = base.clone();
    let Ok(mut segments) = url.path_segments_mut() else {
        exn::bail!(ErrorKind::InvalidUrl(key));
    };
    segments.pop_if_empty();
    for component in &key {
        let Some(component) = component.to_str() else {
            exn::bail!(ErrorKind::InvalidUrl(key.clone()));
        };
        segments.push(component);
    }
    drop(segments);
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://files.example.com/packages/", "a/b/c/d/abcd/Foo-1.0.tar.gz", "https://files.example.com/packages/a/b/c/d/abcd/Foo-1.0.tar.gz")]
    #[case("https://files.example.com/packages", "a/Foo-1.0.tar.gz", "https://files.example.com/packages/a/Foo-1.0.tar.gz")]
    #[case("https://files.example.com", "a/Foo 1.0#x.zip", "https://files.example.com/a/Foo%201.0%23x.zip")]
    fn test_join_url(#[case] base: &str, #[case] key: &str, #[case] expected: &str) {
        let base = Url::parse(base).unwrap();
        assert_eq!(join_url(&base, Path::new(key)).unwrap(), expected);
    }

    #[rstest]
    #[case("https://files.example.com/", "../secret")]
    #[case("mailto:someone@example.com", "a/b")]
    fn test_join_url_rejects(#[case] base: &str, #[case] key: &str) {
        let base = Url::parse(base).unwrap();
        assert!(join_url(&base, Path::new(key)).is_err());
    }
}
