//! In-memory content store for tests in other crates.

use crate::backend::join_url;
use crate::error::{ErrorKind, Result};
use crate::{StorageBackend, validate_key};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use url::Url;

/// Keeps every key in a map. URLs look like `memory://<name>/<key>`.
pub struct MockBackend {
    name: String,
    base_url: Url,
    contents: RwLock<BTreeMap<PathBuf, Vec<u8>>>,
}

impl MockBackend {
    /// A backend that already holds `files`.
    ///
    /// Panics on an invalid key: a broken fixture should fail the test.
    pub fn with_files<K, V>(files: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<Path>,
        V: Into<Vec<u8>>,
    {
        let contents = files
            .into_iter()
            .map(|(key, data)| match validate_key(key.as_ref()) {
                Ok(key) => (key, data.into()),
                Err(err) => panic!("MockBackend fixture: {err}"),
            })
            .collect();
        Self {
            name: "mock".to_string(),
            base_url: memory_url("mock"),
            contents: RwLock::new(contents),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self.base_url = memory_url(&self.name);
        self
    }

    /// Every stored key, in order.
    pub async fn keys(&self) -> Vec<PathBuf> {
        self.contents.read().await.keys().cloned().collect()
    }
}

fn memory_url(name: &str) -> Url {
    match Url::parse(&format!("memory://{name}/")) {
        Ok(url) => url,
        Err(err) => panic!("MockBackend name {name:?} is not a host: {err}"),
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::with_files(Vec::<(PathBuf, Vec<u8>)>::new())
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn contains(&self, key: &Path) -> Result<bool> {
        let key = validate_key(key)?;
        Ok(self.contents.read().await.contains_key(&key))
    }

    async fn get(&self, key: &Path) -> Result<Vec<u8>> {
        let key = validate_key(key)?;
        match self.contents.read().await.get(&key) {
            Some(data) => Ok(data.clone()),
            None => exn::bail!(ErrorKind::Missing(key)),
        }
    }

    async fn put(&self, key: &Path, data: &[u8]) -> Result<()> {
        let key = validate_key(key)?;
        self.contents.write().await.insert(key, data.to_vec());
        Ok(())
    }

    fn url(&self, key: &Path) -> Result<String> {
        join_url(&self.base_url, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixture_contents() {
        let backend = MockBackend::with_files([
            ("a/Foo-1.0.tar.gz", b"sdist".to_vec()),
            ("b/./Foo-1.0-py3-none-any.whl", b"wheel".to_vec()),
        ]);
        assert_eq!(backend.keys().await, [PathBuf::from("a/Foo-1.0.tar.gz"), PathBuf::from("b/Foo-1.0-py3-none-any.whl")]);
        assert_eq!(backend.get(Path::new("a/Foo-1.0.tar.gz")).await.unwrap(), b"sdist");
        let err = backend.get(Path::new("c/missing.zip")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Missing(_)));
    }

    #[tokio::test]
    async fn test_save_and_url() {
        let backend = MockBackend::default().with_name("packages");
        let key = backend.save("Foo-1.0.tar.gz", b"sdist").await.unwrap();
        assert_eq!(backend.keys().await, vec![key.clone()]);
        let url = backend.url(&key).unwrap();
        assert!(url.starts_with("memory://packages/"));
        assert!(url.ends_with("/Foo-1.0.tar.gz"));
    }

    #[tokio::test]
    async fn test_keys_stay_inside_root() {
        let backend = MockBackend::default();
        assert!(backend.get(Path::new("../etc/passwd")).await.is_err());
        assert!(backend.put(Path::new("../escape"), b"bad").await.is_err());
    }

    #[test]
    #[should_panic(expected = "MockBackend fixture")]
    fn test_invalid_fixture_panics() {
        MockBackend::with_files([("../escape", b"bad".to_vec())]);
    }
}
