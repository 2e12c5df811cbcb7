//! Ordering of a project's versions.

use crate::models::Version;
use std::cmp::Ordering;
use wharf_remote::PackageVersion;

/// Version ids in rank order: unparseable version strings first (oldest
/// row first), then parseable ones in ascending version order.
pub(crate) fn ranked(versions: &[Version]) -> Vec<i64> {
    let mut unparsed = Vec::new();
    let mut parsed = Vec::new();
    for version in versions {
        match version.version.parse::<PackageVersion>() {
            Ok(number) => parsed.push((number, version)),
            Err(_) => unparsed.push(version),
        }
    }
    unparsed.sort_by_key(|version| (version.created, version.id));
    parsed.sort_by(|(a, x), (b, y)| match a.cmp(b) {
        Ordering::Equal => x.id.cmp(&y.id),
        other => other,
    });
    unparsed
        .into_iter()
        .map(|version| version.id)
        .chain(parsed.into_iter().map(|(_, version)| version.id))
        .collect()
}
