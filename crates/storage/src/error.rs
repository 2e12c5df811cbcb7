//! Storage Error Types
//!
//! Structured errors using `exn` for automatic location tracking.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::{Path, PathBuf};

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("nothing stored under {}", _0.display())]
    Missing(#[error(not(source))] PathBuf),
    #[display("access denied to {}", _0.display())]
    Denied(#[error(not(source))] PathBuf),
    #[display("I/O failure: {_0}")]
    Io(IoError),
    /// The key is empty, absolute, or climbs out of the store root.
    #[display("invalid storage key: {}", _0.display())]
    InvalidKey(#[error(not(source))] PathBuf),
    #[display("cannot build url for {}", _0.display())]
    InvalidUrl(#[error(not(source))] PathBuf),
    /// The configured root is relative or not a directory.
    #[display("unusable store root: {}", _0.display())]
    InvalidRoot(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Classify an I/O failure on `key`.
    pub(crate) fn io(err: IoError, key: &Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::Missing(key.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::Denied(key.to_path_buf()),
            _ => Self::Io(err),
        }
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
