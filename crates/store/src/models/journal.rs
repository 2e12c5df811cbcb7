use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use wharf_remote::ChangeRecord;

/// A locally recorded change-log entry.
///
/// The action is kept as the upstream text so entries written by older
/// versions stay readable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub id: i64,
    pub name: String,
    pub version: Option<String>,
    pub action: String,
    pub timestamp: i64,
    pub remote_id: Option<i64>,
}

#[derive(sqlx::FromRow)]
pub(crate) struct JournalRow {
    id: i64,
    name: String,
    version: Option<String>,
    action: String,
    timestamp: i64,
    remote_id: Option<i64>,
}
impl TryFrom<JournalRow> for JournalEntry {
    type Error = Error;
    fn try_from(row: JournalRow) -> Result<Self, Self::Error> {
        if row.name.is_empty() {
            exn::bail!(ErrorKind::InvalidData("journal name"));
        }
        Ok(Self {
            id: row.id,
            name: row.name,
            version: row.version,
            action: row.action,
            timestamp: row.timestamp,
            remote_id: row.remote_id,
        })
    }
}

impl JournalEntry {
    /// Whether this entry was recorded from `change`.
    pub fn records(&self, change: &ChangeRecord) -> bool {
        self.remote_id == Some(change.id)
    }

    /// Parses the stored action back into the upstream grammar.
    pub fn parsed_action(&self) -> crate::error::Result<wharf_remote::Action> {
        self.action.parse::<wharf_remote::Action>().or_raise(|| ErrorKind::InvalidData("journal action"))
    }
}
