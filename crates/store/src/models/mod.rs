mod classifier;
mod file;
mod journal;
mod project;
mod requirement;
mod version;

pub use self::classifier::Classifier;
pub(crate) use self::classifier::ClassifierRow;
pub use self::file::File;
pub(crate) use self::file::{FileColumns, FileRow};
pub use self::journal::JournalEntry;
pub(crate) use self::journal::JournalRow;
pub use self::project::Project;
pub(crate) use self::project::ProjectRow;
pub use self::requirement::{RequirementKind, Requirements};
pub(crate) use self::requirement::{RequirementColumns, RequirementRow};
pub use self::version::{Version, VersionMetadata};
pub(crate) use self::version::{VersionColumns, VersionRow};

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use time::UtcDateTime;

pub(crate) fn timestamp(value: i64, column: &'static str) -> Result<UtcDateTime> {
    UtcDateTime::from_unix_timestamp(value).or_raise(|| ErrorKind::InvalidData(column))
}
