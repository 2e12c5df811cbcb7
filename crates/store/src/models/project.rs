use crate::error::Error;
use crate::models::timestamp;
use time::UtcDateTime;

/// A mirrored project, unique by its normalized name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: i64,
    /// Display name as last reported upstream.
    pub name: String,
    pub normalized: String,
    pub created: UtcDateTime,
    pub modified: UtcDateTime,
    pub yanked: bool,
}

#[derive(sqlx::FromRow)]
pub(crate) struct ProjectRow {
    id: i64,
    name: String,
    normalized: String,
    created_at: i64,
    modified_at: i64,
    yanked: bool,
}
impl TryFrom<ProjectRow> for Project {
    type Error = Error;
    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            normalized: row.normalized,
            created: timestamp(row.created_at, "project created")?,
            modified: timestamp(row.modified_at, "project modified")?,
            yanked: row.yanked,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_to_model() {
        let row = ProjectRow {
            id: 3,
            name: "Foo_Bar".to_string(),
            normalized: "foo-bar".to_string(),
            created_at: 1_000,
            modified_at: 2_000,
            yanked: false,
        };
        let project = Project::try_from(row).unwrap();
        assert_eq!(project.normalized, "foo-bar");
        assert_eq!(project.modified.unix_timestamp(), 2_000);
    }

    #[test]
    fn test_row_out_of_range() {
        let row = ProjectRow {
            id: 3,
            name: "foo".to_string(),
            normalized: "foo".to_string(),
            created_at: i64::MAX,
            modified_at: 0,
            yanked: false,
        };
        assert!(Project::try_from(row).is_err());
    }
}
