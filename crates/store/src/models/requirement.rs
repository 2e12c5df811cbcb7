use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use wharf_remote::Requirement;

/// Which relationship list a requirement belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequirementKind {
    Requires,
    Provides,
    Obsoletes,
}
impl RequirementKind {
    pub const ALL: [RequirementKind; 3] = [Self::Requires, Self::Provides, Self::Obsoletes];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requires => "requires",
            Self::Provides => "provides",
            Self::Obsoletes => "obsoletes",
        }
    }
}
impl Display for RequirementKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}
impl FromStr for RequirementKind {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::ALL.iter().find(|kind| kind.as_str() == s) {
            Some(kind) => Ok(*kind),
            None => exn::bail!(ErrorKind::InvalidData("requirement kind")),
        }
    }
}

/// The stored relationships of one version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirements {
    pub requires: Vec<Requirement>,
    pub provides: Vec<Requirement>,
    pub obsoletes: Vec<Requirement>,
}
impl Requirements {
    pub fn get(&self, kind: RequirementKind) -> &[Requirement] {
        match kind {
            RequirementKind::Requires => &self.requires,
            RequirementKind::Provides => &self.provides,
            RequirementKind::Obsoletes => &self.obsoletes,
        }
    }

    fn get_mut(&mut self, kind: RequirementKind) -> &mut Vec<Requirement> {
        match kind {
            RequirementKind::Requires => &mut self.requires,
            RequirementKind::Provides => &mut self.provides,
            RequirementKind::Obsoletes => &mut self.obsoletes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.requires.is_empty() && self.provides.is_empty() && self.obsoletes.is_empty()
    }

    pub(crate) fn from_rows(rows: Vec<RequirementRow>) -> Result<Self, Error> {
        let mut requirements = Self::default();
        for row in rows {
            let kind = row.kind.parse::<RequirementKind>()?;
            requirements.get_mut(kind).push(Requirement::try_from(row)?);
        }
        Ok(requirements)
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct RequirementRow {
    kind: String,
    name: String,
    versions: String,
    environment: Option<String>,
    approximate: bool,
}
impl TryFrom<RequirementRow> for Requirement {
    type Error = Error;
    fn try_from(row: RequirementRow) -> Result<Self, Self::Error> {
        Ok(Self {
            name: row.name,
            versions: serde_json::from_str(&row.versions).or_raise(|| ErrorKind::InvalidData("requirement versions"))?,
            environment: row.environment,
            approximate: row.approximate,
        })
    }
}

/// Bindable columns of one requirement row.
pub(crate) struct RequirementColumns {
    pub(crate) name: String,
    pub(crate) versions: String,
    pub(crate) environment: Option<String>,
    pub(crate) approximate: bool,
}
impl TryFrom<&Requirement> for RequirementColumns {
    type Error = Error;
    fn try_from(requirement: &Requirement) -> Result<Self, Self::Error> {
        Ok(Self {
            name: requirement.name.clone(),
            versions: serde_json::to_string(&requirement.versions)
                .or_raise(|| ErrorKind::InvalidData("requirement versions"))?,
            environment: requirement.environment.clone(),
            approximate: requirement.approximate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("requires", RequirementKind::Requires)]
    #[case("provides", RequirementKind::Provides)]
    #[case("obsoletes", RequirementKind::Obsoletes)]
    fn test_kind_parse(#[case] raw: &str, #[case] expected: RequirementKind) {
        assert_eq!(raw.parse::<RequirementKind>().unwrap(), expected);
        assert_eq!(expected.to_string(), raw);
    }

    #[test]
    fn test_kind_parse_invalid() {
        assert!("depends".parse::<RequirementKind>().is_err());
    }

    #[test]
    fn test_rows_grouped_by_kind() {
        let row = |kind: &str, name: &str| RequirementRow {
            kind: kind.to_string(),
            name: name.to_string(),
            versions: r#"[">=1.0"]"#.to_string(),
            environment: None,
            approximate: false,
        };
        let requirements =
            Requirements::from_rows(vec![row("requires", "a"), row("obsoletes", "b"), row("requires", "c")]).unwrap();
        assert_eq!(requirements.requires.len(), 2);
        assert_eq!(requirements.get(RequirementKind::Obsoletes)[0].name, "b");
        assert!(requirements.provides.is_empty());
        assert_eq!(requirements.requires[1].versions, vec![">=1.0"]);
    }
}
