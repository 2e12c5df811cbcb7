use crate::error::{Error, ErrorKind};
use crate::models::timestamp;
use exn::ResultExt;
use serde_json::{from_str as from_json, to_string as to_json};
use std::collections::BTreeMap;
use time::UtcDateTime;
use wharf_remote::ReleaseRecord;

/// Release metadata columns that an upsert compares and overwrites.
///
/// Missing upstream values are stored as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionMetadata {
    pub summary: String,
    pub description: String,
    pub author: String,
    pub author_email: String,
    pub maintainer: String,
    pub maintainer_email: String,
    pub license: String,
    pub requires_python: String,
    pub download_uri: String,
    pub keywords: Vec<String>,
    pub platforms: Vec<String>,
    pub uris: BTreeMap<String, String>,
    pub requires_external: Vec<String>,
    pub requires_old: Vec<String>,
    pub provides_old: Vec<String>,
    pub obsoletes_old: Vec<String>,
}
impl From<&ReleaseRecord> for VersionMetadata {
    fn from(release: &ReleaseRecord) -> Self {
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        Self {
            summary: text(&release.summary),
            description: text(&release.description),
            author: text(&release.author),
            author_email: text(&release.author_email),
            maintainer: text(&release.maintainer),
            maintainer_email: text(&release.maintainer_email),
            license: text(&release.license),
            requires_python: text(&release.requires_python),
            download_uri: text(&release.download_uri),
            keywords: release.keywords.clone(),
            platforms: release.platforms.clone(),
            uris: release.uris.clone(),
            requires_external: release.requires_external.clone(),
            requires_old: release.requires_old.clone(),
            provides_old: release.provides_old.clone(),
            obsoletes_old: release.obsoletes_old.clone(),
        }
    }
}

/// A mirrored release of a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub id: i64,
    pub project_id: i64,
    pub version: String,
    pub metadata: VersionMetadata,
    /// Position in the project's ordered release list, lowest first.
    pub rank: i64,
    pub created: UtcDateTime,
    pub modified: UtcDateTime,
    pub yanked: bool,
}

#[derive(sqlx::FromRow)]
pub(crate) struct VersionRow {
    id: i64,
    project_id: i64,
    version: String,
    summary: String,
    description: String,
    author: String,
    author_email: String,
    maintainer: String,
    maintainer_email: String,
    license: String,
    requires_python: String,
    download_uri: String,
    keywords: String,
    platforms: String,
    uris: String,
    requires_external: String,
    requires_old: String,
    provides_old: String,
    obsoletes_old: String,
    rank: i64,
    created_at: i64,
    modified_at: i64,
    yanked: bool,
}
impl TryFrom<VersionRow> for Version {
    type Error = Error;
    fn try_from(row: VersionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            project_id: row.project_id,
            version: row.version,
            metadata: VersionMetadata {
                summary: row.summary,
                description: row.description,
                author: row.author,
                author_email: row.author_email,
                maintainer: row.maintainer,
                maintainer_email: row.maintainer_email,
                license: row.license,
                requires_python: row.requires_python,
                download_uri: row.download_uri,
                keywords: from_json(&row.keywords).or_raise(|| ErrorKind::InvalidData("keywords"))?,
                platforms: from_json(&row.platforms).or_raise(|| ErrorKind::InvalidData("platforms"))?,
                uris: from_json(&row.uris).or_raise(|| ErrorKind::InvalidData("uris"))?,
                requires_external: from_json(&row.requires_external)
                    .or_raise(|| ErrorKind::InvalidData("requires_external"))?,
                requires_old: from_json(&row.requires_old).or_raise(|| ErrorKind::InvalidData("requires_old"))?,
                provides_old: from_json(&row.provides_old).or_raise(|| ErrorKind::InvalidData("provides_old"))?,
                obsoletes_old: from_json(&row.obsoletes_old).or_raise(|| ErrorKind::InvalidData("obsoletes_old"))?,
            },
            rank: row.rank,
            created: timestamp(row.created_at, "version created")?,
            modified: timestamp(row.modified_at, "version modified")?,
            yanked: row.yanked,
        })
    }
}

/// [`VersionMetadata`] encoded for binding, in column order.
pub(crate) struct VersionColumns {
    pub(crate) summary: String,
    pub(crate) description: String,
    pub(crate) author: String,
    pub(crate) author_email: String,
    pub(crate) maintainer: String,
    pub(crate) maintainer_email: String,
    pub(crate) license: String,
    pub(crate) requires_python: String,
    pub(crate) download_uri: String,
    pub(crate) keywords: String,
    pub(crate) platforms: String,
    pub(crate) uris: String,
    pub(crate) requires_external: String,
    pub(crate) requires_old: String,
    pub(crate) provides_old: String,
    pub(crate) obsoletes_old: String,
}
impl TryFrom<&VersionMetadata> for VersionColumns {
    type Error = Error;
    fn try_from(metadata: &VersionMetadata) -> Result<Self, Self::Error> {
        Ok(Self {
            summary: metadata.summary.clone(),
            description: metadata.description.clone(),
            author: metadata.author.clone(),
            author_email: metadata.author_email.clone(),
            maintainer: metadata.maintainer.clone(),
            maintainer_email: metadata.maintainer_email.clone(),
            license: metadata.license.clone(),
            requires_python: metadata.requires_python.clone(),
            download_uri: metadata.download_uri.clone(),
            keywords: to_json(&metadata.keywords).or_raise(|| ErrorKind::InvalidData("keywords"))?,
            platforms: to_json(&metadata.platforms).or_raise(|| ErrorKind::InvalidData("platforms"))?,
            uris: to_json(&metadata.uris).or_raise(|| ErrorKind::InvalidData("uris"))?,
            requires_external: to_json(&metadata.requires_external)
                .or_raise(|| ErrorKind::InvalidData("requires_external"))?,
            requires_old: to_json(&metadata.requires_old).or_raise(|| ErrorKind::InvalidData("requires_old"))?,
            provides_old: to_json(&metadata.provides_old).or_raise(|| ErrorKind::InvalidData("provides_old"))?,
            obsoletes_old: to_json(&metadata.obsoletes_old).or_raise(|| ErrorKind::InvalidData("obsoletes_old"))?,
        })
    }
}
