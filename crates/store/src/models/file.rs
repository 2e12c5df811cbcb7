use crate::digest::Digests;
use crate::error::{Error, ErrorKind};
use crate::models::timestamp;
use exn::ResultExt;
use time::UtcDateTime;
use wharf_remote::{FileRecord, FileType};

/// A mirrored distribution file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    pub id: i64,
    pub version_id: i64,
    pub filename: String,
    pub file_type: FileType,
    pub python_version: String,
    pub filesize: u64,
    pub comment: Option<String>,
    pub url: String,
    /// Digest reported upstream at the last upsert.
    pub md5_digest: String,
    /// Digests computed from the bytes last written to the content store.
    pub hashes: Digests,
    pub storage_key: Option<String>,
    pub uploaded: UtcDateTime,
    pub created: UtcDateTime,
    pub modified: UtcDateTime,
    pub yanked: bool,
}
impl File {
    /// Whether the stored bytes are missing or differ from what upstream
    /// now advertises.
    pub fn needs_download(&self, upstream_md5: &str) -> bool {
        self.hashes.get("md5").is_none_or(|md5| md5 != upstream_md5)
    }

    pub(crate) fn differs_from(&self, record: &FileRecord) -> bool {
        self.file_type != record.file_type
            || self.python_version != record.python_version
            || self.filesize != record.filesize
            || self.comment.as_deref().unwrap_or_default() != record.comment.as_deref().unwrap_or_default()
            || self.url != record.url
            || self.md5_digest != record.md5_digest
            || self.uploaded.unix_timestamp() != record.created.unix_timestamp()
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct FileRow {
    id: i64,
    version_id: i64,
    filename: String,
    file_type: String,
    python_version: String,
    filesize: i64,
    comment: String,
    url: String,
    md5_digest: Option<String>,
    hashes: String,
    storage_key: Option<String>,
    uploaded_at: i64,
    created_at: i64,
    modified_at: i64,
    yanked: bool,
}
impl TryFrom<FileRow> for File {
    type Error = Error;
    fn try_from(row: FileRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            version_id: row.version_id,
            filename: row.filename,
            file_type: row.file_type.parse::<FileType>().or_raise(|| ErrorKind::InvalidData("file type"))?,
            python_version: row.python_version,
            filesize: u64::try_from(row.filesize).or_raise(|| ErrorKind::InvalidData("file size"))?,
            comment: Some(row.comment).filter(|comment| !comment.is_empty()),
            url: row.url,
            md5_digest: row.md5_digest.unwrap_or_default(),
            hashes: serde_json::from_str(&row.hashes).or_raise(|| ErrorKind::InvalidData("hashes"))?,
            storage_key: row.storage_key,
            uploaded: timestamp(row.uploaded_at, "file uploaded")?,
            created: timestamp(row.created_at, "file created")?,
            modified: timestamp(row.modified_at, "file modified")?,
            yanked: row.yanked,
        })
    }
}

/// Upstream-reported columns of a file, encoded for binding.
pub(crate) struct FileColumns {
    pub(crate) file_type: &'static str,
    pub(crate) python_version: String,
    pub(crate) filesize: i64,
    pub(crate) comment: String,
    pub(crate) url: String,
    pub(crate) md5_digest: String,
    pub(crate) uploaded_at: i64,
}
impl TryFrom<&FileRecord> for FileColumns {
    type Error = Error;
    fn try_from(record: &FileRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            file_type: record.file_type.as_str(),
            python_version: record.python_version.clone(),
            filesize: i64::try_from(record.filesize).or_raise(|| ErrorKind::InvalidData("file size"))?,
            comment: record.comment.clone().unwrap_or_default(),
            url: record.url.clone(),
            md5_digest: record.md5_digest.clone(),
            uploaded_at: record.created.unix_timestamp(),
        })
    }
}
