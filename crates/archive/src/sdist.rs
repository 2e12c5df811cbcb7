//! Source-distribution inspection.

use std::io::Read;
use std::path::Path;

use exn::ResultExt;
use tracing::{debug, instrument};

use crate::Compression;
use crate::error::{ErrorKind, Result};
use crate::requires::parse_requires_txt;

/// Upper bound on how much of a `requires.txt` is read.
const MAX_REQUIRES_SIZE: u64 = 1024 * 1024;

fn is_requires_txt(path: &Path) -> bool {
    path.file_name().is_some_and(|name| name == "requires.txt")
        && path
            .parent()
            .and_then(Path::file_name)
            .and_then(|dir| dir.to_str())
            .is_some_and(|dir| dir.ends_with(".egg-info"))
}

/// Contents of the `*.egg-info/requires.txt` closest to the archive root.
///
/// `Ok(None)` means the archive is readable but has no such file. Formats
/// other than tarballs fail with
/// [`Unsupported`](crate::error::ErrorKind::Unsupported), and
/// archives that don't decode fail with
/// [`Malformed`](crate::error::ErrorKind::Malformed).
#[instrument(level = "debug", skip(data), fields(size = data.len()))]
pub fn find_requires_txt(filename: &str, data: &[u8]) -> Result<Option<String>> {
    let format = Compression::from_tarball_name(filename)?;
    if Compression::sniff(data) != format {
        exn::bail!(ErrorKind::Malformed);
    }
    let mut archive = tar::Archive::new(format.decoder(data));
    let mut best: Option<(usize, String)> = None;
    for entry in archive.entries().or_raise(|| ErrorKind::Malformed)? {
        let entry = entry.or_raise(|| ErrorKind::Malformed)?;
        let path = entry.path().or_raise(|| ErrorKind::Malformed)?.into_owned();
        if !is_requires_txt(&path) {
            continue;
        }
        let depth = path.components().count();
        if best.as_ref().is_some_and(|(shallowest, _)| *shallowest <= depth) {
            continue;
        }
        let mut contents = String::new();
        entry
            .take(MAX_REQUIRES_SIZE)
            .read_to_string(&mut contents)
            .or_raise(|| ErrorKind::Malformed)?;
        debug!(path = %path.display(), depth, "found requires.txt");
        best = Some((depth, contents));
    }
    Ok(best.map(|(_, contents)| contents))
}

/// Requirement strings inferred from a source distribution's setuptools
/// metadata; empty when it has none.
pub fn approximate_requirements(filename: &str, data: &[u8]) -> Result<Vec<String>> {
    Ok(find_requires_txt(filename, data)?
        .map(|text| parse_requires_txt(&text))
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tarball(format: Compression, files: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, contents.as_bytes()).unwrap();
        }
        format.compress(&builder.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn test_finds_shallowest_requires_txt() {
        let data = tarball(
            Compression::Gzip,
            &[
                ("Foo-1.0/setup.py", "from setuptools import setup"),
                ("Foo-1.0/vendor/bar.egg-info/requires.txt", "nested"),
                ("Foo-1.0/Foo.egg-info/requires.txt", "requests>=2.0"),
            ],
        );
        assert_eq!(find_requires_txt("Foo-1.0.tar.gz", &data).unwrap().as_deref(), Some("requests>=2.0"));
    }

    #[test]
    fn test_bzip2_tarball() {
        let data = tarball(Compression::Bzip2, &[("Foo-1.0/Foo.egg-info/requires.txt", "six\n[ssl]\npyOpenSSL")]);
        assert_eq!(
            approximate_requirements("Foo-1.0.tar.bz2", &data).unwrap(),
            vec!["six".to_string(), "pyOpenSSL; extra == 'ssl'".to_string()]
        );
    }

    #[test]
    fn test_missing_requires_txt() {
        let data = tarball(Compression::Gzip, &[("Foo-1.0/PKG-INFO", "Metadata-Version: 1.0")]);
        assert_eq!(find_requires_txt("Foo-1.0.tgz", &data).unwrap(), None);
        assert!(approximate_requirements("Foo-1.0.tgz", &data).unwrap().is_empty());
    }

    #[test]
    fn test_ignores_lookalikes() {
        let data = tarball(
            Compression::Gzip,
            &[("Foo-1.0/requires.txt", "top"), ("Foo-1.0/egg-info/requires.txt", "no suffix")],
        );
        assert_eq!(find_requires_txt("Foo-1.0.tar.gz", &data).unwrap(), None);
    }

    #[test]
    fn test_corrupt_archive() {
        let err = find_requires_txt("Foo-1.0.tar.gz", b"definitely not gzip").unwrap_err();
        assert_eq!(*err, ErrorKind::Malformed);
        // Gzip content under a bzip2 name
        let data = tarball(Compression::Gzip, &[("Foo-1.0/Foo.egg-info/requires.txt", "six")]);
        assert!(find_requires_txt("Foo-1.0.tar.bz2", &data).is_err());
    }

    #[test]
    fn test_unsupported_format() {
        let err = find_requires_txt("Foo-1.0.zip", b"PK\x03\x04").unwrap_err();
        assert!(matches!(&*err, ErrorKind::Unsupported(_)));
    }
}
