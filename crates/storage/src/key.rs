//! Storage keys.
//!
//! A key is a relative path below the store root. [`validate_key`] keeps it
//! there and [`content_key`] derives the key a file's bytes are saved under.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Normalizes `key` and rejects anything that would resolve outside the
/// store root.
///
/// `.` components and repeated or trailing separators are dropped, and a
/// `..` that stays inside the root is resolved. Null bytes are rejected
/// since they truncate paths at the syscall boundary.
///
/// ```
/// use std::path::Path;
/// use wharf_storage::validate_key;
/// assert_eq!(validate_key("a//b/./Foo-1.0.tar.gz").unwrap(), Path::new("a/b/Foo-1.0.tar.gz"));
/// assert_eq!(validate_key("a/tmp/../Foo-1.0.whl").unwrap(), Path::new("a/Foo-1.0.whl"));
/// assert!(validate_key("../etc/passwd").is_err());
/// assert!(validate_key("a\0b").is_err());
/// ```
pub fn validate_key(key: impl AsRef<Path>) -> Result<PathBuf> {
    let key = key.as_ref();
    let invalid = || ErrorKind::InvalidKey(key.to_path_buf());
    let mut parts = Vec::new();
    for component in key.components() {
        match component {
            Component::Normal(part) if part.as_encoded_bytes().contains(&0) => exn::bail!(invalid()),
            Component::Normal(part) => parts.push(part),
            Component::CurDir | Component::RootDir => {},
            Component::ParentDir => {
                if parts.pop().is_none() {
                    exn::bail!(invalid());
                }
            },
            Component::Prefix(_) => exn::bail!(invalid()),
        }
    }
    if parts.is_empty() {
        exn::bail!(invalid());
    }
    Ok(parts.into_iter().collect())
}

/// The key `data` is saved under as `filename`:
/// `h[0]/h[1]/h[2]/h[3]/h/<filename>`, where `h` is the hex BLAKE3 digest
/// of the bytes.
///
/// ```
/// use std::path::Path;
/// use wharf_storage::content_key;
/// let key = content_key("Foo-1.0.tar.gz", b"").unwrap();
/// let hex = blake3::hash(b"").to_hex();
/// assert!(key.starts_with(Path::new(&hex[0..1])));
/// assert!(key.ends_with(Path::new(hex.as_str()).join("Foo-1.0.tar.gz")));
/// ```
pub fn content_key(filename: &str, data: &[u8]) -> Result<PathBuf> {
    let name = validate_key(filename)?;
    if name.components().count() != 1 {
        exn::bail!(ErrorKind::InvalidKey(PathBuf::from(filename)));
    }
    let digest = blake3::hash(data).to_hex();
    let digest = digest.as_str();
    let mut key = digest.chars().take(4).map(String::from).collect::<PathBuf>();
    key.push(digest);
    key.push(name);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Foo/Foo-1.0.tar.gz", "Foo/Foo-1.0.tar.gz")]
    #[case("simple.zip", "simple.zip")]
    #[case("a//b//c", "a/b/c")]
    #[case("a/./b/./c", "a/b/c")]
    #[case("a/b/c///", "a/b/c")]
    #[case("/a/b", "a/b")]
    #[case("a/b/..", "a")]
    fn test_validate_key(#[case] key: &str, #[case] expected: &str) {
        assert_eq!(validate_key(key).unwrap(), Path::new(expected));
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("./.")]
    #[case("//")]
    #[case("..")]
    #[case("../etc/passwd")]
    #[case("a/../../b")]
    #[case("a\0b")]
    fn test_validate_key_rejects(#[case] key: &str) {
        let err = validate_key(key).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidKey(_)));
    }

    #[test]
    fn test_content_key_layout() {
        let data = b"Foo sdist bytes";
        let hex = blake3::hash(data).to_hex().to_string();
        let key = content_key("Foo-1.0.tar.gz", data).unwrap();
        let expected: PathBuf = [&hex[0..1], &hex[1..2], &hex[2..3], &hex[3..4], hex.as_str(), "Foo-1.0.tar.gz"]
            .iter()
            .collect();
        assert_eq!(key, expected);
    }

    #[test]
    fn test_content_key_depends_on_bytes() {
        let one = content_key("Foo-1.0.tar.gz", b"one").unwrap();
        assert_ne!(one, content_key("Foo-1.0.tar.gz", b"two").unwrap());
        assert_eq!(one, content_key("Foo-1.0.tar.gz", b"one").unwrap());
    }

    #[rstest]
    #[case("sub/Foo-1.0.tar.gz")]
    #[case("../Foo-1.0.tar.gz")]
    #[case("")]
    fn test_content_key_rejects_nested_filenames(#[case] filename: &str) {
        assert!(content_key(filename, b"").is_err());
    }
}
