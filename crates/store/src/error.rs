//! Store Error Types
//!
//! Structured errors using `exn` for automatic location tracking.

use derive_more::{Display, Error};

/// A store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// The stored state contradicts the requested change.
    #[display("conflict: {_0}")]
    Conflict(#[error(not(source))] String),
    /// A stored column could not be decoded.
    #[display("invalid data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
    /// Writing file bytes to the content store failed.
    #[display("content store error")]
    Storage,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database | Self::Storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exn::ResultExt;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::Database.to_string(), "database error");
        assert_eq!(ErrorKind::NotFound("project foo".into()).to_string(), "not found: project foo");
        assert_eq!(ErrorKind::InvalidData("keywords").to_string(), "invalid data: keywords");
    }

    #[test]
    fn error_kind_retryable() {
        assert!(ErrorKind::Database.is_retryable());
        assert!(ErrorKind::Storage.is_retryable());
        assert!(!ErrorKind::Migration.is_retryable());
        assert!(!ErrorKind::Conflict("name".into()).is_retryable());
    }

    #[test]
    fn error_from_result() {
        let result: std::result::Result<(), serde_json::Error> = serde_json::from_str::<()>("{");
        let err: Result<()> = result.or_raise(|| ErrorKind::InvalidData("uris"));
        assert_eq!(*err.unwrap_err(), ErrorKind::InvalidData("uris"));
    }
}
