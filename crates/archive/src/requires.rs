//! The setuptools `requires.txt` format.
//!
//! ```text
//! requests>=2.0
//!
//! [ssl]
//! pyOpenSSL
//!
//! [socks:python_version < "3"]
//! PySocks!=1.5.7
//!
//! [:sys_platform == "win32"]
//! colorama
//! ```
//!
//! Lines before any header are unconditional. A header names an extra, an
//! environment marker after a `:`, or both.

/// Environment marker implied by a section header.
fn section_marker(section: &str) -> Option<String> {
    let (extra, marker) = match section.split_once(':') {
        Some((extra, marker)) => (extra.trim(), Some(marker.trim()).filter(|m| !m.is_empty())),
        None => (section.trim(), None),
    };
    match (extra.is_empty(), marker) {
        (true, None) => None,
        (true, Some(marker)) => Some(marker.to_string()),
        (false, None) => Some(format!("extra == '{extra}'")),
        (false, Some(marker)) => Some(format!("extra == '{extra}' and ({marker})")),
    }
}

/// Turns `requires.txt` text into requirement strings of the form
/// `predicate` or `predicate; marker`.
///
/// Blank lines and `#` comments are skipped. Lines are returned verbatim
/// otherwise, so invalid predicates are left for the caller to reject.
pub fn parse_requires_txt(text: &str) -> Vec<String> {
    let mut marker: Option<String> = None;
    let mut requirements = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(section) = line.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
            marker = section_marker(section);
            continue;
        }
        let requirement = match (&marker, line.split_once(';')) {
            (None, _) => line.to_string(),
            (Some(section), None) => format!("{line}; {section}"),
            (Some(section), Some((predicate, own))) => {
                format!("{}; ({}) and ({section})", predicate.trim(), own.trim())
            },
        };
        requirements.push(requirement);
    }
    requirements
}
