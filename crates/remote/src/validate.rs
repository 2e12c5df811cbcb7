//! Typed validators, one per upstream payload kind.
//!
//! Each validator takes the raw JSON value returned by the transport, drops
//! placeholder values, checks every field it understands and maps upstream
//! field names onto local ones. Unknown keys are ignored; anything malformed
//! fails the whole payload.

use std::collections::{BTreeMap, BTreeSet};

use exn::OptionExt;
use serde_json::{Map, Value};
use time::{PrimitiveDateTime, UtcDateTime};
use tracing::instrument;

use crate::consts::{
    DAYTIME_FORMAT, ISO_FORMAT, ISO_SUBSECOND_FORMAT, MD5_REGEX, PYTHON_VERSION_REGEX,
};
use crate::error::{ErrorKind, Result};
use crate::models::{ChangeRecord, FileRecord, FileType, ReleaseRecord, Requirement};
use crate::predicate::parse_constraints;

const RELEASE: &str = "release";
const FILE: &str = "file";
const CHANGE: &str = "change";
const PROJECT_LIST: &str = "project list";
const VERSION_LIST: &str = "version list";

const MAX_URL_LABEL: usize = 32;

/// Drops keys whose value carries no information: `null`, the placeholder
/// strings `"None"`/`"UNKNOWN"` (unless the key is required), and empty
/// strings or arrays.
pub fn filter(raw: Map<String, Value>, required: &[&str]) -> Map<String, Value> {
    raw.into_iter()
        .filter(|(key, value)| match value {
            Value::Null => false,
            Value::String(s) if !required.contains(&key.as_str()) && (s == "None" || s == "UNKNOWN") => false,
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Object(items) => !items.is_empty(),
            _ => true,
        })
        .collect()
}

/// Splits a comma separated string, or a whitespace separated one when it
/// contains no commas.
fn split_list(raw: &str) -> Vec<String> {
    let parts: Vec<&str> = if raw.contains(',') {
        raw.split(',').collect()
    } else {
        raw.split_whitespace().collect()
    };
    parts.into_iter().map(str::trim).filter(|part| !part.is_empty()).map(str::to_string).collect()
}

fn is_name(raw: &str) -> bool {
    !raw.is_empty() && !raw.contains('/')
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<UtcDateTime> {
    let raw = raw.trim();
    let raw = raw.strip_suffix('Z').unwrap_or(raw);
    [&*ISO_FORMAT, &*ISO_SUBSECOND_FORMAT, &*DAYTIME_FORMAT]
        .into_iter()
        .find_map(|format| PrimitiveDateTime::parse(raw, format).ok())
        .map(|datetime| datetime.as_utc())
}

/// Field accessor for one payload object that knows which payload it is
/// validating, so every error names both payload and field.
struct Fields {
    payload: &'static str,
    map: Map<String, Value>,
}

impl Fields {
    fn new(payload: &'static str, value: Value, required: &[&str]) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Fields {
                payload,
                map: filter(map, required),
            }),
            other => exn::bail!(ErrorKind::invalid(payload, "payload", other)),
        }
    }

    fn invalid(&self, field: &'static str, value: impl ToString) -> ErrorKind {
        ErrorKind::invalid(self.payload, field, value)
    }

    fn required(&mut self, field: &'static str) -> Result<Value> {
        let payload = self.payload;
        self.map.remove(field).ok_or_raise(|| ErrorKind::MissingField { payload, field })
    }

    fn string(&mut self, field: &'static str) -> Result<Option<String>> {
        match self.map.remove(field) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => exn::bail!(self.invalid(field, other)),
        }
    }

    fn required_string(&mut self, field: &'static str) -> Result<String> {
        match self.required(field)? {
            Value::String(s) => Ok(s),
            other => exn::bail!(self.invalid(field, other)),
        }
    }

    fn strings(&mut self, field: &'static str) -> Result<Vec<String>> {
        match self.map.remove(field) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s),
                    other => exn::bail!(self.invalid(field, other)),
                })
                .collect(),
            Some(other) => exn::bail!(self.invalid(field, other)),
        }
    }

    /// Accepts either a list of strings or a single delimited string.
    fn string_or_list(&mut self, field: &'static str) -> Result<Vec<String>> {
        if matches!(self.map.get(field), Some(Value::String(_))) {
            Ok(self.string(field)?.map(|s| split_list(&s)).unwrap_or_default())
        } else {
            self.strings(field)
        }
    }

    fn requirements(&mut self, field: &'static str) -> Result<Vec<Requirement>> {
        self.strings(field)?
            .iter()
            .map(|raw| match raw.parse::<Requirement>() {
                Ok(requirement) => Ok(requirement),
                Err(_) => exn::bail!(self.invalid(field, raw)),
            })
            .collect()
    }

    fn unsigned(&mut self, field: &'static str) -> Result<Option<u64>> {
        match self.map.remove(field) {
            None => Ok(None),
            Some(value) => match value.as_u64() {
                Some(n) => Ok(Some(n)),
                None => exn::bail!(self.invalid(field, value)),
            },
        }
    }
}

#[instrument(level = "trace", skip(value))]
pub fn project_list(value: Value) -> Result<BTreeSet<String>> {
    let items = match value {
        Value::Array(items) => items,
        other => exn::bail!(ErrorKind::invalid(PROJECT_LIST, "payload", other)),
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(name) if is_name(&name) => Ok(name),
            other => exn::bail!(ErrorKind::invalid(PROJECT_LIST, "name", other)),
        })
        .collect()
}

#[instrument(level = "trace", skip(value))]
pub fn version_list(value: Value) -> Result<Vec<String>> {
    let items = match value {
        Value::Array(items) => items,
        other => exn::bail!(ErrorKind::invalid(VERSION_LIST, "payload", other)),
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(version) if !version.is_empty() => Ok(version),
            other => exn::bail!(ErrorKind::invalid(VERSION_LIST, "version", other)),
        })
        .collect()
}

#[instrument(level = "trace", skip(value))]
pub fn release(value: Value) -> Result<ReleaseRecord> {
    let mut fields = Fields::new(RELEASE, value, &["name", "version"])?;

    let name = fields.required_string("name")?;
    if !is_name(&name) {
        exn::bail!(fields.invalid("name", name));
    }
    let version = fields.required_string("version")?;
    if version.is_empty() {
        exn::bail!(fields.invalid("version", version));
    }

    let classifiers = fields.strings("classifiers")?;
    if let Some(bad) = classifiers.iter().find(|trove| !trove.contains("::")) {
        exn::bail!(fields.invalid("classifiers", bad));
    }
    let classifiers: BTreeSet<String> = classifiers.into_iter().collect();

    let requires_python = fields.string("requires_python")?;
    if let Some(constraints) = &requires_python
        && parse_constraints(constraints).is_none()
    {
        exn::bail!(fields.invalid("requires_python", constraints));
    }

    let mut uris = BTreeMap::new();
    if let Some(bugtracker) = fields.string("bugtrack_url")? {
        uris.insert("bugtracker".to_string(), bugtracker);
    }
    if let Some(home_page) = fields.string("home_page")? {
        uris.insert("home page".to_string(), home_page);
    }
    for entry in fields.strings("project_url")? {
        let Some((label, uri)) = entry.split_once(',') else {
            exn::bail!(fields.invalid("project_url", entry));
        };
        let label = label.trim();
        if label.chars().count() > MAX_URL_LABEL {
            exn::bail!(fields.invalid("project_url", label));
        }
        uris.insert(label.to_string(), uri.trim().to_string());
    }

    Ok(ReleaseRecord {
        name,
        version,
        summary: fields.string("summary")?,
        description: fields.string("description")?,
        author: fields.string("author")?,
        author_email: fields.string("author_email")?,
        maintainer: fields.string("maintainer")?,
        maintainer_email: fields.string("maintainer_email")?,
        license: fields.string("license")?,
        requires_python,
        download_uri: fields.string("download_url")?,
        keywords: fields.string_or_list("keywords")?,
        platforms: fields.string_or_list("platform")?,
        classifiers: classifiers.into_iter().collect(),
        uris,
        requires: fields.requirements("requires_dist")?,
        provides: fields.requirements("provides_dist")?,
        obsoletes: fields.requirements("obsoletes_dist")?,
        requires_external: fields.strings("requires_external")?,
        requires_old: fields.strings("requires")?,
        provides_old: fields.strings("provides")?,
        obsoletes_old: fields.strings("obsoletes")?,
    })
}

#[instrument(level = "trace", skip(value))]
pub fn file(value: Value) -> Result<FileRecord> {
    let mut fields = Fields::new(FILE, value, &[])?;

    let filename = fields.required_string("filename")?;
    if !is_name(&filename) {
        exn::bail!(fields.invalid("filename", filename));
    }
    let url = fields.required_string("url")?;
    let file_type: FileType = fields.required_string("packagetype")?.parse()?;
    let md5_digest = fields.required_string("md5_digest")?;
    if !MD5_REGEX.is_match(&md5_digest) {
        exn::bail!(fields.invalid("md5_digest", md5_digest));
    }
    let python_version = fields.required_string("python_version")?;
    if !PYTHON_VERSION_REGEX.is_match(&python_version) {
        exn::bail!(fields.invalid("python_version", python_version));
    }
    let filesize = match fields.unsigned("size")? {
        Some(size) => size,
        None => exn::bail!(ErrorKind::MissingField {
            payload: FILE,
            field: "size"
        }),
    };
    fields.unsigned("downloads")?;
    let created = match fields.required("upload_time")? {
        Value::String(raw) => parse_timestamp(&raw).ok_or_raise(|| ErrorKind::invalid(FILE, "upload_time", &raw))?,
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| UtcDateTime::from_unix_timestamp(secs).ok())
            .ok_or_raise(|| ErrorKind::invalid(FILE, "upload_time", &n))?,
        other => exn::bail!(fields.invalid("upload_time", other)),
    };

    Ok(FileRecord {
        filename,
        url,
        file_type,
        python_version,
        md5_digest: md5_digest.to_lowercase(),
        filesize,
        created,
        comment: fields.string("comment_text")?,
    })
}

/// Validates one `[name, version|null, timestamp, action, id]` change entry.
#[instrument(level = "trace", skip(value))]
pub fn change(value: Value) -> Result<ChangeRecord> {
    let items = match value {
        Value::Array(items) if items.len() >= 5 => items,
        other => exn::bail!(ErrorKind::invalid(CHANGE, "payload", other)),
    };
    let (name, version, timestamp, action, id) = (&items[0], &items[1], &items[2], &items[3], &items[4]);
    let name = match name {
        Value::String(name) if is_name(name) => name.clone(),
        other => exn::bail!(ErrorKind::invalid(CHANGE, "name", other)),
    };
    let version = match version {
        Value::Null => None,
        Value::String(version) if !version.is_empty() => Some(version.clone()),
        other => exn::bail!(ErrorKind::invalid(CHANGE, "version", other)),
    };
    let timestamp = match timestamp.as_i64() {
        Some(timestamp) if timestamp > 0 => timestamp,
        _ => exn::bail!(ErrorKind::invalid(CHANGE, "timestamp", timestamp)),
    };
    let action = match action {
        Value::String(action) => action.parse()?,
        other => exn::bail!(ErrorKind::invalid(CHANGE, "action", other)),
    };
    let id = id.as_i64().ok_or_raise(|| ErrorKind::invalid(CHANGE, "id", id))?;
    Ok(ChangeRecord {
        name,
        version,
        timestamp,
        action,
        id,
    })
}

#[instrument(level = "trace", skip(value))]
pub fn changelog(value: Value) -> Result<Vec<ChangeRecord>> {
    match value {
        Value::Array(items) => items.into_iter().map(change).collect(),
        other => exn::bail!(ErrorKind::invalid(CHANGE, "payload", other)),
    }
}
