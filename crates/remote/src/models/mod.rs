mod change;
mod file;
mod number;
mod release;

pub use self::change::{Action, ChangeRecord, Role};
pub use self::file::{FileRecord, FileType};
pub use self::number::{PackageVersion, PreRelease};
pub use self::release::{ReleaseRecord, Requirement};

use crate::consts::NORMALIZE_REGEX;

/// Folds a display name into the form used for identity comparisons:
/// runs of anything but ASCII letters, digits and `.` become a single `-`,
/// then everything is lowercased.
pub fn normalize(name: impl AsRef<str>) -> String {
    NORMALIZE_REGEX.replace_all(name.as_ref(), "-").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::normalize;
    use rstest::rstest;

    #[rstest]
    #[case("Foo", "foo")]
    #[case("Foo_Bar", "foo-bar")]
    #[case("zope.interface", "zope.interface")]
    #[case("Some  Weird__Name!", "some-weird-name-")]
    #[case("already-normal", "already-normal")]
    fn test_normalize(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(normalize(name), expected);
    }
}
