//! Multi-segment version comparison
//!
//! Manifest versions and host requirements are "semantic-ish": `6.4`,
//! `8.1.2`, `1.3.24`, occasionally `2.0.0-beta.1`. They are compared segment
//! by segment as numbers, never as strings, so `1.3.9 < 1.3.24` holds.
//!
//! # Examples
//!
//! ```
//! use globalblocks_updater::version::{compare_versions, is_newer, satisfies_minimum};
//! use std::cmp::Ordering;
//!
//! assert_eq!(compare_versions("1.3.9", "1.3.24"), Ordering::Less);
//! assert!(is_newer("1.2.12", "1.3.0"));
//! assert!(satisfies_minimum("7.4", "8.1"));
//! ```

use semver::Prerelease;
use std::cmp::Ordering;

/// A version string split into numeric release segments and an optional
/// pre-release tag
#[derive(Debug, PartialEq, Eq)]
struct ParsedVersion<'a> {
    release: Vec<u64>,
    pre: Option<&'a str>,
}

fn parse(version: &str) -> ParsedVersion<'_> {
    let trimmed = version.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    // Build metadata never affects ordering
    let without_build = trimmed.split('+').next().unwrap_or("");

    let (release, pre) = match without_build.split_once('-') {
        Some((release, pre)) if !pre.is_empty() => (release, Some(pre)),
        Some((release, _)) => (release, None),
        None => (without_build, None),
    };

    let release = release.split('.').map(numeric_prefix).collect();

    ParsedVersion { release, pre }
}

/// Leading digits of a segment; `"24rc"` is 24, `""` and `"x"` are 0
fn numeric_prefix(segment: &str) -> u64 {
    let digits: String = segment
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();

    if digits.is_empty() {
        0
    } else {
        digits.parse().unwrap_or(u64::MAX)
    }
}

fn compare_pre(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        // A pre-release sorts before its release
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (Some(a), Some(b)) => match (Prerelease::new(a), Prerelease::new(b)) {
            (Ok(a), Ok(b)) => a.cmp(&b),
            _ => a.cmp(b),
        },
    }
}

/// Compare two version strings numerically, segment by segment
///
/// The shorter release sequence is padded with zeros, so `1.0` equals `1.0.0`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let a = parse(a);
    let b = parse(b);

    let len = a.release.len().max(b.release.len());
    for i in 0..len {
        let left = a.release.get(i).copied().unwrap_or(0);
        let right = b.release.get(i).copied().unwrap_or(0);
        match left.cmp(&right) {
            Ordering::Equal => continue,
            other => return other,
        }
    }

    compare_pre(a.pre, b.pre)
}

/// True when `remote` is strictly newer than `installed`
pub fn is_newer(installed: &str, remote: &str) -> bool {
    compare_versions(installed, remote) == Ordering::Less
}

/// True when `actual` meets the minimum `required` version
///
/// An empty requirement is always met.
pub fn satisfies_minimum(required: &str, actual: &str) -> bool {
    if required.trim().is_empty() {
        return true;
    }
    compare_versions(required, actual) != Ordering::Greater
}
