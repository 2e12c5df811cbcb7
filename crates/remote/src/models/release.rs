use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use crate::error::{Error, ErrorKind};
use crate::predicate::{is_valid_marker, parse_predicate, split_marker};

/// A dependency relationship: project name, version constraints and an
/// optional environment marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Requirement {
    pub name: String,
    pub versions: Vec<String>,
    pub environment: Option<String>,
    /// Inferred from an archive's metadata rather than declared upstream.
    pub approximate: bool,
}

impl Requirement {
    #[must_use]
    pub fn approximate(mut self) -> Self {
        self.approximate = true;
        self
    }
}

impl FromStr for Requirement {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (predicate, marker) = split_marker(s);
        let Some(parsed) = parse_predicate(predicate) else {
            exn::bail!(ErrorKind::invalid("requirement", "predicate", s));
        };
        if let Some(marker) = marker
            && !is_valid_marker(marker)
        {
            exn::bail!(ErrorKind::invalid("requirement", "marker", s));
        }
        Ok(Requirement {
            name: parsed.name,
            versions: parsed.constraints,
            environment: marker.map(str::to_string),
            approximate: false,
        })
    }
}

impl Display for Requirement {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.name)?;
        if !self.versions.is_empty() {
            write!(f, " ({})", self.versions.join(", "))?;
        }
        if let Some(environment) = &self.environment {
            write!(f, "; {environment}")?;
        }
        Ok(())
    }
}

/// Validated release metadata with upstream field names already mapped onto
/// local ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseRecord {
    pub name: String,
    pub version: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub author_email: Option<String>,
    pub maintainer: Option<String>,
    pub maintainer_email: Option<String>,
    pub license: Option<String>,
    pub requires_python: Option<String>,
    pub download_uri: Option<String>,
    pub keywords: Vec<String>,
    pub platforms: Vec<String>,
    /// Deduplicated and sorted.
    pub classifiers: Vec<String>,
    /// Label to URI, e.g. `home page`, `bugtracker` and `project_url` labels.
    pub uris: BTreeMap<String, String>,
    pub requires: Vec<Requirement>,
    pub provides: Vec<Requirement>,
    pub obsoletes: Vec<Requirement>,
    pub requires_external: Vec<String>,
    // Deprecated metadata 1.1 fields, kept verbatim.
    pub requires_old: Vec<String>,
    pub provides_old: Vec<String>,
    pub obsoletes_old: Vec<String>,
}
