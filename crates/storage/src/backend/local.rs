//! Content store in a local directory.

use crate::backend::join_url;
use crate::error::{ErrorKind, Result};
use crate::{StorageBackend, validate_key};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tracing::instrument;
use url::Url;

/// Distinguishes concurrent writers' temporary files.
static PARTIAL: AtomicU64 = AtomicU64::new(0);

/// Stores each key as a file below `root`.
///
/// Without a base URL, [`url`](StorageBackend::url) hands out `file://`
/// URLs.
///
/// ```no_run
/// use url::Url;
/// use wharf_storage::backend::LocalBackend;
///
/// let base = Url::parse("https://mirror.example.com/packages/").unwrap();
/// let backend = LocalBackend::new("packages", "/srv/mirror/packages")?.with_base_url(base);
/// # Ok::<(), wharf_storage::error::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct LocalBackend {
    name: String,
    root: PathBuf,
    base_url: Option<Url>,
}

impl LocalBackend {
    /// A store rooted at the absolute directory `root`, created if missing.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() || (root.exists() && !root.is_dir()) {
            exn::bail!(ErrorKind::InvalidRoot(root));
        }
        // Blocking, but only once at start-up.
        std::fs::create_dir_all(&root).map_err(|err| ErrorKind::io(err, &root))?;
        Ok(Self {
            name: name.into(),
            root,
            base_url: None,
        })
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &Path) -> Result<PathBuf> {
        Ok(self.root.join(validate_key(key)?))
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn contains(&self, key: &Path) -> Result<bool> {
        let path = self.resolve(key)?;
        Ok(fs::try_exists(&path).await.map_err(|err| ErrorKind::io(err, key))?)
    }

    async fn get(&self, key: &Path) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        Ok(fs::read(&path).await.map_err(|err| ErrorKind::io(err, key))?)
    }

    #[instrument(level = "debug", skip(self, data), fields(backend = %self.name, size = data.len()))]
    async fn put(&self, key: &Path, data: &[u8]) -> Result<()> {
        let path = self.resolve(key)?;
        let Some((parent, name)) = path.parent().zip(path.file_name()) else {
            exn::bail!(ErrorKind::InvalidKey(key.to_path_buf()));
        };
        fs::create_dir_all(parent).await.map_err(|err| ErrorKind::io(err, key))?;
        // Write beside the destination, then rename over it.
        let mut partial = name.to_os_string();
        partial.push(format!(".{}.{}.partial", std::process::id(), PARTIAL.fetch_add(1, Ordering::Relaxed)));
        let partial = parent.join(partial);
        if let Err(err) = fs::write(&partial, data).await {
            _ = fs::remove_file(&partial).await;
            exn::bail!(ErrorKind::io(err, key));
        }
        fs::rename(&partial, &path).await.map_err(|err| ErrorKind::io(err, key))?;
        Ok(())
    }

    fn url(&self, key: &Path) -> Result<String> {
        if let Some(base) = &self.base_url {
            return join_url(base, key);
        }
        let path = self.resolve(key)?;
        match Url::from_file_path(&path) {
            Ok(url) => Ok(url.into()),
            Err(()) => exn::bail!(ErrorKind::InvalidUrl(path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> (tempfile::TempDir, LocalBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("local", dir.path()).unwrap();
        (dir, backend)
    }

    #[test]
    fn test_root_must_be_absolute_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("packages/nested");
        assert_eq!(LocalBackend::new("local", &nested).unwrap().root(), nested);
        assert!(nested.is_dir());

        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"").unwrap();
        for root in [file.as_path(), Path::new("relative/path")] {
            let err = LocalBackend::new("local", root).unwrap_err();
            assert!(matches!(&*err, ErrorKind::InvalidRoot(_)));
        }
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (dir, backend) = backend();
        let key = Path::new("a/b/c/Foo-1.0.tar.gz");
        assert!(!backend.contains(key).await.unwrap());
        backend.put(key, b"sdist").await.unwrap();
        backend.put(key, b"sdist, again").await.unwrap();
        assert!(backend.contains(key).await.unwrap());
        assert_eq!(backend.get(key).await.unwrap(), b"sdist, again");
        // No temporary files are left behind.
        let entries = std::fs::read_dir(dir.path().join("a/b/c")).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let (_dir, backend) = backend();
        let err = backend.get(Path::new("missing.whl")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Missing(_)));
    }

    #[tokio::test]
    async fn test_save_is_content_addressed() {
        let (dir, backend) = backend();
        let key = backend.save("Foo-1.0.tar.gz", b"Foo sdist").await.unwrap();
        assert_eq!(key, crate::content_key("Foo-1.0.tar.gz", b"Foo sdist").unwrap());
        assert!(dir.path().join(&key).is_file());
        assert_eq!(backend.save("Foo-1.0.tar.gz", b"Foo sdist").await.unwrap(), key);
    }

    #[test]
    fn test_url() {
        let (_dir, backend) = backend();
        let url = backend.url(Path::new("a/Foo-1.0.tar.gz")).unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("/a/Foo-1.0.tar.gz"));

        let backend = backend.with_base_url(Url::parse("https://mirror.example.com/packages/").unwrap());
        assert_eq!(
            backend.url(Path::new("a/Foo-1.0.tar.gz")).unwrap(),
            "https://mirror.example.com/packages/a/Foo-1.0.tar.gz"
        );
    }

    #[tokio::test]
    async fn test_keys_stay_inside_root() {
        let (_dir, backend) = backend();
        assert!(backend.get(Path::new("../etc/passwd")).await.is_err());
        assert!(backend.get(Path::new("etc/../../passwd")).await.is_err());
        assert!(backend.put(Path::new("../escape"), b"data").await.is_err());
        assert!(backend.contains(Path::new("../../file")).await.is_err());
        assert!(backend.url(Path::new("../file")).is_err());
    }
}
