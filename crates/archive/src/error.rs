//! Archive errors.

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The bytes do not decode as the archive they claim to be.
    #[display("malformed archive")]
    Malformed,
    /// Not a tarball we know how to open.
    #[display("unsupported archive: {_0}")]
    Unsupported(#[error(not(source))] String),
    #[display("archive I/O failed")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        *self == Self::Io
    }
}
