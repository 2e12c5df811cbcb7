//! Tarball compression.

use crate::error::{ErrorKind, Result};
use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use derive_more::Display;
use exn::ResultExt;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{Read, Write};
use tracing::instrument;

/// How a source-distribution tarball is compressed.
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, Hash)]
pub enum Compression {
    #[default]
    #[display("none")]
    None,
    #[display("bzip2")]
    Bzip2,
    #[display("gzip")]
    Gzip,
}

impl Compression {
    /// Compression named by a tarball's suffix: `.tar`, `.tar.gz`, `.tgz`,
    /// `.tar.bz2`, `.tbz` or `.tbz2`, in any case.
    ///
    /// Anything else (a `.zip`, an `.egg`, a bare `.gz`) is
    /// [`Unsupported`](ErrorKind::Unsupported).
    ///
    /// ```
    /// use wharf_archive::Compression;
    ///
    /// assert_eq!(Compression::from_tarball_name("Foo-1.0.TGZ").unwrap(), Compression::Gzip);
    /// assert!(Compression::from_tarball_name("Foo-1.0.zip").is_err());
    /// ```
    pub fn from_tarball_name(filename: &str) -> Result<Self> {
        let lower = filename.to_ascii_lowercase();
        let inner = |suffix: &str| lower.strip_suffix(suffix).is_some_and(|stem| stem.ends_with(".tar"));
        let format = match lower.rsplit_once('.').map(|(_, suffix)| suffix) {
            Some("tar") => Self::None,
            Some("tgz") => Self::Gzip,
            Some("tbz" | "tbz2") => Self::Bzip2,
            Some("gz") if inner(".gz") => Self::Gzip,
            Some("bz2") if inner(".bz2") => Self::Bzip2,
            _ => exn::bail!(ErrorKind::Unsupported(filename.to_string())),
        };
        Ok(format)
    }

    /// Compression announced by the leading bytes of `data`. Data with no
    /// recognised signature counts as uncompressed.
    #[must_use]
    pub fn sniff(data: &[u8]) -> Self {
        match data {
            [0x1F, 0x8B, ..] => Self::Gzip,
            [b'B', b'Z', b'h', ..] => Self::Bzip2,
            _ => Self::None,
        }
    }

    /// A reader yielding the decompressed contents of `reader`.
    pub fn decoder<'a>(self, reader: impl Read + 'a) -> Box<dyn Read + 'a> {
        match self {
            Self::None => Box::new(reader),
            Self::Bzip2 => Box::new(BzDecoder::new(reader)),
            Self::Gzip => Box::new(GzDecoder::new(reader)),
        }
    }

    /// Compress `data` in memory at the default level.
    ///
    /// ```
    /// use wharf_archive::Compression;
    ///
    /// let packed = Compression::Bzip2.compress(b"requests>=2.0").unwrap();
    /// assert_eq!(Compression::sniff(&packed), Compression::Bzip2);
    /// ```
    #[instrument(level = "debug", skip(data), fields(format = %self, size = data.len()))]
    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::None => Ok(data.to_vec()),
            Self::Bzip2 => {
                let mut writer = BzEncoder::new(Vec::new(), bzip2::Compression::default());
                writer.write_all(data).or_raise(|| ErrorKind::Io)?;
                writer.finish().or_raise(|| ErrorKind::Io)
            },
            Self::Gzip => {
                let mut writer = GzEncoder::new(Vec::new(), flate2::Compression::default());
                writer.write_all(data).or_raise(|| ErrorKind::Io)?;
                writer.finish().or_raise(|| ErrorKind::Io)
            },
        }
    }
}
