use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use crate::consts::{
    ACTION_ADD_FILE_REGEX, ACTION_REMOVE_FILE_REGEX, ACTION_RENAME_REGEX, ACTION_ROLE_REGEX, ACTION_UPDATE_REGEX,
    PYTHON_VERSION_REGEX,
};
use crate::error::{Error, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Owner,
    Maintainer,
}

/// The closed grammar of change-log actions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    NewRelease,
    Remove,
    Create,
    DocUpdate,
    /// `update` optionally followed by the comma-separated fields touched.
    Update(Vec<String>),
    AddRole(Role, String),
    RemoveRole(Role, String),
    /// The project was previously known under this name.
    RenameFrom(String),
    AddFile {
        python_version: String,
        filename: String,
    },
    RemoveFile(String),
}

fn role(raw: &str) -> Role {
    if raw.eq_ignore_ascii_case("owner") {
        Role::Owner
    } else {
        Role::Maintainer
    }
}

impl FromStr for Action {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let action = s.trim();
        match action.to_lowercase().as_str() {
            "new release" => return Ok(Action::NewRelease),
            "remove" => return Ok(Action::Remove),
            "create" => return Ok(Action::Create),
            "docupdate" => return Ok(Action::DocUpdate),
            _ => {},
        }
        if let Some(caps) = ACTION_UPDATE_REGEX.captures(action) {
            let fields = caps
                .get(1)
                .map(|m| {
                    m.as_str()
                        .split(',')
                        .map(str::trim)
                        .filter(|field| !field.is_empty())
                        .map(str::to_string)
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            if caps.get(1).is_some() && fields.is_empty() {
                exn::bail!(ErrorKind::invalid("change", "action", s));
            }
            return Ok(Action::Update(fields));
        }
        if let Some(caps) = ACTION_ROLE_REGEX.captures(action) {
            let name = caps[3].trim().to_string();
            return Ok(if caps[1].eq_ignore_ascii_case("add") {
                Action::AddRole(role(&caps[2]), name)
            } else {
                Action::RemoveRole(role(&caps[2]), name)
            });
        }
        if let Some(caps) = ACTION_RENAME_REGEX.captures(action) {
            return Ok(Action::RenameFrom(caps[1].trim().to_string()));
        }
        if let Some(caps) = ACTION_REMOVE_FILE_REGEX.captures(action) {
            return Ok(Action::RemoveFile(caps[1].trim().to_string()));
        }
        if let Some(caps) = ACTION_ADD_FILE_REGEX.captures(action)
            && PYTHON_VERSION_REGEX.is_match(&caps[1])
        {
            return Ok(Action::AddFile {
                python_version: caps[1].to_string(),
                filename: caps[2].trim().to_string(),
            });
        }
        exn::bail!(ErrorKind::invalid("change", "action", s))
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let role = |role: &Role| match role {
            Role::Owner => "Owner",
            Role::Maintainer => "Maintainer",
        };
        match self {
            Action::NewRelease => write!(f, "new release"),
            Action::Remove => write!(f, "remove"),
            Action::Create => write!(f, "create"),
            Action::DocUpdate => write!(f, "docupdate"),
            Action::Update(fields) if fields.is_empty() => write!(f, "update"),
            Action::Update(fields) => write!(f, "update {}", fields.join(", ")),
            Action::AddRole(r, name) => write!(f, "add {} {}", role(r), name),
            Action::RemoveRole(r, name) => write!(f, "remove {} {}", role(r), name),
            Action::RenameFrom(previous) => write!(f, "rename from {previous}"),
            Action::AddFile {
                python_version,
                filename,
            } => write!(f, "add {python_version} file {filename}"),
            Action::RemoveFile(filename) => write!(f, "remove file {filename}"),
        }
    }
}

/// One entry of the upstream change log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub name: String,
    pub version: Option<String>,
    /// Upstream clock value (epoch seconds) the change was recorded at.
    pub timestamp: i64,
    pub action: Action,
    /// Upstream sequence id, unique across the whole log.
    pub id: i64,
}

impl ChangeRecord {
    /// `remove` with no version: the whole project is gone.
    pub fn is_project_removal(&self) -> bool {
        self.action == Action::Remove && self.version.is_none()
    }

    pub fn renamed_from(&self) -> Option<&str> {
        match &self.action {
            Action::RenameFrom(previous) => Some(previous),
            _ => None,
        }
    }
}
