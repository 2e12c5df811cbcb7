use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use time::UtcDateTime;

use crate::error::{Error, ErrorKind};

/// Distribution file kinds understood by the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    /// Source distribution
    Sdist,
    BdistDumb,
    BdistRpm,
    BdistWininst,
    BdistMsi,
    BdistEgg,
    BdistDmg,
    BdistWheel,
}

impl FileType {
    pub const ALL: [FileType; 8] = [
        FileType::Sdist,
        FileType::BdistDumb,
        FileType::BdistRpm,
        FileType::BdistWininst,
        FileType::BdistMsi,
        FileType::BdistEgg,
        FileType::BdistDmg,
        FileType::BdistWheel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Sdist => "sdist",
            FileType::BdistDumb => "bdist_dumb",
            FileType::BdistRpm => "bdist_rpm",
            FileType::BdistWininst => "bdist_wininst",
            FileType::BdistMsi => "bdist_msi",
            FileType::BdistEgg => "bdist_egg",
            FileType::BdistDmg => "bdist_dmg",
            FileType::BdistWheel => "bdist_wheel",
        }
    }

    pub fn is_source(&self) -> bool {
        matches!(self, FileType::Sdist)
    }
}

impl FromStr for FileType {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match FileType::ALL.iter().find(|kind| kind.as_str() == s) {
            Some(kind) => Ok(*kind),
            None => exn::bail!(ErrorKind::invalid("file", "packagetype", s)),
        }
    }
}

impl TryFrom<String> for FileType {
    type Error = Error;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.as_str().parse()
    }
}

impl Display for FileType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// A validated distribution file descriptor for one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub filename: String,
    pub url: String,
    pub file_type: FileType,
    pub python_version: String,
    pub md5_digest: String,
    pub filesize: u64,
    pub created: UtcDateTime,
    pub comment: Option<String>,
}
