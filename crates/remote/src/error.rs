//! Remote Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A remote index error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for remote index operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A payload field failed its schema or grammar check. Retrying with the
    /// same upstream data will fail the same way.
    #[display("invalid {payload} payload: field '{field}' has value {value}")]
    Validation {
        /// The kind of payload being validated (release, file, change, ...).
        payload: &'static str,
        /// The field that failed validation.
        field: &'static str,
        /// The offending value, rendered for diagnostics.
        value: String,
    },
    /// A required field was absent from a payload.
    #[display("invalid {payload} payload: missing required field '{field}'")]
    MissingField {
        /// The kind of payload being validated.
        payload: &'static str,
        /// The missing field.
        field: &'static str,
    },
    /// The request never produced a response (connection, DNS, timeout).
    #[display("transport failure while fetching {_0}")]
    Transport(#[error(not(source))] String),
    /// The upstream answered with a non-success status code.
    #[display("unexpected HTTP status {_0}")]
    Status(#[error(not(source))] u16),
    /// The upstream answered an RPC call with a fault.
    #[display("remote fault: {_0}")]
    Fault(#[error(not(source))] String),
    /// The response body could not be decoded.
    #[display("malformed response body")]
    Decode,
    /// A URL could not be parsed or rewritten.
    #[display("invalid URL: {_0}")]
    InvalidUrl(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ErrorKind::Transport(_) => true,
            ErrorKind::Status(code) => *code >= 500 || *code == 429,
            _ => false,
        }
    }

    pub(crate) fn invalid(payload: &'static str, field: &'static str, value: impl ToString) -> Self {
        ErrorKind::Validation {
            payload,
            field,
            value: value.to_string(),
        }
    }
}
