use std::{
    cmp::Ordering,
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use crate::consts::VERSION_REGEX;
use crate::error::{Error, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreRelease {
    Alpha,
    Beta,
    Candidate,
}

/// A parsed release number, ordered the way installers order them.
///
/// Local version labels are kept for display but do not take part in
/// equality or ordering beyond breaking ties between otherwise equal versions.
#[derive(Debug, Clone)]
pub struct PackageVersion {
    raw: String,
    epoch: u64,
    release: Vec<u64>,
    pre: Option<(PreRelease, u64)>,
    post: Option<u64>,
    dev: Option<u64>,
    local: Option<String>,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum PreKey {
    // `1.0.dev1` sorts before `1.0a1`.
    DevOnly,
    Pre(PreRelease, u64),
    Final,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum DevKey {
    Dev(u64),
    Final,
}

type SortKey<'a> = (u64, &'a [u64], PreKey, Option<u64>, DevKey, Option<&'a str>);

impl PackageVersion {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }

    fn key(&self) -> SortKey<'_> {
        let mut release = self.release.as_slice();
        while let [rest @ .., 0] = release {
            release = rest;
        }
        let pre = match (self.pre, self.post, self.dev) {
            (None, None, Some(_)) => PreKey::DevOnly,
            (Some((kind, n)), _, _) => PreKey::Pre(kind, n),
            (None, _, _) => PreKey::Final,
        };
        let dev = self.dev.map_or(DevKey::Final, DevKey::Dev);
        (self.epoch, release, pre, self.post, dev, self.local.as_deref())
    }
}

fn number(caps: &regex::Captures<'_>, group: &str, raw: &str) -> Result<Option<u64>, Error> {
    caps.name(group)
        .map(|m| m.as_str().parse::<u64>())
        .transpose()
        .map_err(|_| Error::from(ErrorKind::invalid("version", "number", raw)))
}

impl FromStr for PackageVersion {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let Some(caps) = VERSION_REGEX.captures(trimmed) else {
            exn::bail!(ErrorKind::invalid("version", "number", s));
        };
        let release = caps["release"]
            .split('.')
            .map(str::parse::<u64>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| Error::from(ErrorKind::invalid("version", "number", s)))?;
        let pre = match caps.name("pre_l") {
            Some(label) => {
                let kind = match label.as_str().to_lowercase().as_str() {
                    "a" | "alpha" => PreRelease::Alpha,
                    "b" | "beta" => PreRelease::Beta,
                    _ => PreRelease::Candidate,
                };
                Some((kind, number(&caps, "pre_n", s)?.unwrap_or(0)))
            },
            None => None,
        };
        let post = match number(&caps, "post_n1", s)? {
            Some(n) => Some(n),
            None if caps.name("post_l").is_some() => Some(number(&caps, "post_n2", s)?.unwrap_or(0)),
            None => None,
        };
        let dev = match caps.name("dev_l") {
            Some(_) => Some(number(&caps, "dev_n", s)?.unwrap_or(0)),
            None => None,
        };
        Ok(PackageVersion {
            raw: trimmed.to_string(),
            epoch: number(&caps, "epoch", s)?.unwrap_or(0),
            release,
            pre,
            post,
            dev,
            local: caps.name("local").map(|m| m.as_str().to_lowercase()),
        })
    }
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for PackageVersion {}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl Display for PackageVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn v(s: &str) -> PackageVersion {
        s.parse().unwrap()
    }

    #[rstest]
    #[case("1.0.dev1", "1.0a1")]
    #[case("1.0a1", "1.0a2")]
    #[case("1.0a2", "1.0b1")]
    #[case("1.0b1", "1.0rc1")]
    #[case("1.0rc1", "1.0")]
    #[case("1.0", "1.0.post1")]
    #[case("1.0.post1.dev1", "1.0.post1")]
    #[case("1.0", "1.1")]
    #[case("1.9", "1.10")]
    #[case("1.0", "1!0.1")]
    #[case("2.0", "2.0+local")]
    fn test_ordering(#[case] lower: &str, #[case] higher: &str) {
        assert!(v(lower) < v(higher), "{lower} < {higher}");
    }

    #[rstest]
    #[case("1.0", "1.0.0")]
    #[case("1.0c1", "1.0rc1")]
    #[case("1.0-1", "1.0.post1")]
    #[case("v2.3", "2.3")]
    #[case("1.0ALPHA", "1.0a0")]
    fn test_equivalent(#[case] left: &str, #[case] right: &str) {
        assert_eq!(v(left), v(right));
    }

    #[rstest]
    #[case("")]
    #[case("latest")]
    #[case("1.0-beta-final")]
    #[case("2004d")]
    #[case("99999999999999999999999.0")]
    fn test_unparseable(#[case] raw: &str) {
        assert!(raw.parse::<PackageVersion>().is_err());
    }

    #[test]
    fn test_display_keeps_original_text() {
        assert_eq!(v(" 1.0RC1 ").to_string(), "1.0RC1");
        assert!(v("1.0rc1").is_prerelease());
        assert!(!v("1.0.post2").is_prerelease());
    }
}
