//! Synchronization Error Types
//!
//! Structured errors using `exn` for automatic location tracking. A batch
//! that fails reports the names of the projects it could not finish so an
//! operator can re-run just those.

use derive_more::{Display, Error};

/// A synchronization error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for synchronization operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// ### Expected
/// - [`ErrorKind::LockTimeout`]: another worker holds the project; skip it.
///
/// ### Batch outcomes
/// - [`ErrorKind::Timeout`]
/// - [`ErrorKind::Synchronization`]
///
/// ### Dependency Errors
/// - [`ErrorKind::Remote`], [`ErrorKind::Store`], [`ErrorKind::Storage`],
///   [`ErrorKind::Lock`], [`ErrorKind::Checkpoint`], [`ErrorKind::Classifiers`],
///   [`ErrorKind::Journal`]
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("timed out waiting for lock {_0}")]
    LockTimeout(#[error(not(source))] String),
    #[display("lock service error")]
    Lock,
    /// One project's resynchronization failed.
    #[display("synchronization of project {_0} failed")]
    Task(#[error(not(source))] String),
    /// The batch deadline passed; `failed` lists every unfinished or failed project.
    #[display("batch timed out: {}", failed.join(", "))]
    Timeout { failed: Vec<String> },
    /// At least one project failed; the rest of the batch completed.
    #[display("synchronization failed for: {}", failed.join(", "))]
    Synchronization { failed: Vec<String> },
    #[display("checkpoint store error")]
    Checkpoint,
    #[display("classifier synchronization failed")]
    Classifiers,
    #[display("change log processing failed")]
    Journal,
    #[display("upstream index error")]
    Remote,
    #[display("mirror database error")]
    Store,
    #[display("content store error")]
    Storage,
    #[display("invalid configuration")]
    Config,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::LockTimeout(_) | Self::Timeout { .. } | Self::Synchronization { .. } | Self::Remote | Self::Store
        )
    }

    /// Projects an operator should re-run after this error.
    pub fn failed_projects(&self) -> &[String] {
        match self {
            Self::Timeout { failed } | Self::Synchronization { failed } => failed,
            Self::Task(project) | Self::LockTimeout(project) => std::slice::from_ref(project),
            _ => &[],
        }
    }
}
