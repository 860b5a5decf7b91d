//! Version ordering used to decide whether an installation is outdated.
//!
//! Versions are compared as semver after lenient normalization: a leading
//! `v` is dropped and missing minor/patch components are zero, so `1.0`
//! and `v1.0.0` are equal.

use semver::Version;
use std::cmp::Ordering;

pub fn parse_lenient(raw: &str) -> Option<Version> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(version) = Version::parse(trimmed) {
        return Some(version);
    }

    // Pad the numeric core, keeping any pre-release or build suffix.
    let split = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(split);
    let parts: Vec<&str> = core.split('.').collect();
    if parts.len() >= 3 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }

    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(suffix);

    Version::parse(&padded).ok()
}

/// `Some(true)` when `current` is strictly newer than `local`, `None` when
/// either side is not a recognizable version. Build metadata does not
/// count towards precedence.
pub fn is_outdated(local: &str, current: &str) -> Option<bool> {
    let local = parse_lenient(local)?;
    let current = parse_lenient(current)?;
    Some(current.cmp_precedence(&local) == Ordering::Greater)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pads_missing_components() {
        assert_eq!(parse_lenient("1"), Some(Version::new(1, 0, 0)));
        assert_eq!(parse_lenient("1.0"), Some(Version::new(1, 0, 0)));
        assert_eq!(parse_lenient("v1.2.3"), Some(Version::new(1, 2, 3)));
    }

    #[test]
    fn test_parse_keeps_prerelease() {
        let version = parse_lenient("1.2-beta.1").unwrap();
        assert_eq!(version.to_string(), "1.2.0-beta.1");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_lenient("").is_none());
        assert!(parse_lenient("latest").is_none());
        assert!(parse_lenient("1..2").is_none());
        assert!(parse_lenient("1.2.3.4").is_none());
    }

    #[test]
    fn test_semantic_not_lexical_ordering() {
        assert_eq!(is_outdated("1.9.0", "1.10.0"), Some(true));
        assert_eq!(is_outdated("1.10.0", "1.9.0"), Some(false));
    }

    #[test]
    fn test_equal_versions_are_current() {
        assert_eq!(is_outdated("1.0", "1.0"), Some(false));
        assert_eq!(is_outdated("v1.0.0", "1.0"), Some(false));
    }

    #[test]
    fn test_prerelease_is_older_than_release() {
        assert_eq!(is_outdated("2.0.0-rc.1", "2.0.0"), Some(true));
    }

    #[test]
    fn test_build_metadata_is_ignored() {
        assert_eq!(is_outdated("1.0.0+build.1", "1.0.0+build.2"), Some(false));
        assert_eq!(is_outdated("1.0.0+build.2", "1.0.0+build.1"), Some(false));
        assert_eq!(is_outdated("1.0+linux", "1.1.0"), Some(true));
    }

    #[test]
    fn test_unparseable_is_unknown() {
        assert_eq!(is_outdated("dev", "1.0.0"), None);
        assert_eq!(is_outdated("1.0.0", ""), None);
    }
}
