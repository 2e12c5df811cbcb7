use regex::Regex;
use std::sync::LazyLock;
use time::format_description::{BorrowedFormatItem, parse_borrowed};

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

macro_rules! timestamp_format {
    ($name:ident, $format:expr) => {
        pub(crate) static $name: LazyLock<Vec<BorrowedFormatItem<'static>>> =
            LazyLock::new(|| parse_borrowed::<2>($format).unwrap());
    };
}

// Project names fold every run of punctuation or whitespace into a single dash.
regex!(NORMALIZE_REGEX, r"[^A-Za-z0-9.]+");
regex!(MD5_REGEX, r"^[0-9A-Fa-f]{32}$");
regex!(
    PYTHON_VERSION_REGEX,
    r"(?i)^(?:any|source|[23]\.\d+(?:\.\d+)*|(?:py|cp|pp|ip|jy)\d+(?:\.(?:py|cp|pp|ip|jy)\d+)*)$"
);

// Change-log action grammar. Keywords are matched case-insensitively; the
// captured names keep whatever case upstream reported.
regex!(ACTION_UPDATE_REGEX, r"(?i)^update(?:\s+(.+))?$");
regex!(ACTION_ROLE_REGEX, r"(?i)^(add|remove)\s+(owner|maintainer)\s+(\S.*)$");
regex!(ACTION_RENAME_REGEX, r"(?i)^rename\s+from\s+(\S.*)$");
regex!(ACTION_ADD_FILE_REGEX, r"(?i)^add\s+(\S+)\s+file\s+(\S.*)$");
regex!(ACTION_REMOVE_FILE_REGEX, r"(?i)^remove\s+file\s+(\S.*)$");

// Requirement predicates: `name [extras] (op ver, ...)`, parentheses optional.
regex!(
    PREDICATE_REGEX,
    r"^([A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)\s*(?:\[([^\]]*)\])?\s*(?:\((.*)\)|(.*))$"
);
regex!(CONSTRAINT_REGEX, r"^(~=|==|!=|<=|>=|<|>)?\s*(v?[0-9][A-Za-z0-9.*+!_-]*)$");
regex!(MARKER_IDENT_REGEX, r"^[A-Za-z_][A-Za-z0-9_.]*");

regex!(
    VERSION_REGEX,
    r"(?ix)^v?
        (?:(?P<epoch>\d+)!)?
        (?P<release>\d+(?:\.\d+)*)
        (?:[-_.]?(?P<pre_l>alpha|a|beta|b|preview|pre|c|rc)[-_.]?(?P<pre_n>\d+)?)?
        (?:-(?P<post_n1>\d+)|[-_.]?(?P<post_l>post|rev|r)[-_.]?(?P<post_n2>\d+)?)?
        (?:[-_.]?(?P<dev_l>dev)[-_.]?(?P<dev_n>\d+)?)?
        (?:\+(?P<local>[a-z0-9]+(?:[-_.][a-z0-9]+)*))?
    $"
);

timestamp_format!(DAYTIME_FORMAT, "[year][month][day]T[hour]:[minute]:[second]");
timestamp_format!(ISO_FORMAT, "[year]-[month]-[day]T[hour]:[minute]:[second]");
timestamp_format!(ISO_SUBSECOND_FORMAT, "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");
