// src/version/mod.rs

//! Semantic version parsing, ordering, and bump arithmetic.
//!
//! Versions are strict `major.minor.patch` triples. Parsing tolerates a
//! leading `v`/`V` (release tags are often written that way) but rendering
//! is always canonical, so `v.to_string()` never reproduces the prefix.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A parsed semantic version. Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

/// Classification of a release by the nature of its changes.
///
/// Ordered by strength: when multiple signals disagree, the strongest wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpType {
    Patch,
    Minor,
    Major,
}

impl BumpType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Patch => "patch",
        }
    }

    /// Parse a bump kind from a config string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "major" => Some(Self::Major),
            "minor" => Some(Self::Minor),
            "patch" => Some(Self::Patch),
            _ => None,
        }
    }
}

impl fmt::Display for BumpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a version string.
    ///
    /// Accepts `"1.2.3"` and tag-style `"v1.2.3"`. Anything else is a
    /// format error: no pre-release suffixes, no missing components.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let bare = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        let mut parts = bare.split('.');
        let (major, minor, patch) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(b), Some(c), None) => (
                parse_component(a, s)?,
                parse_component(b, s)?,
                parse_component(c, s)?,
            ),
            _ => return Err(Error::Format(s.to_string())),
        };

        Ok(Self::new(major, minor, patch))
    }

    /// Return a new version with the given component bumped.
    ///
    /// Major increments major and zeroes minor/patch; Minor increments
    /// minor and zeroes patch; Patch increments patch only.
    pub fn bump(&self, kind: BumpType) -> Version {
        match kind {
            BumpType::Major => Version::new(self.major + 1, 0, 0),
            BumpType::Minor => Version::new(self.major, self.minor + 1, 0),
            BumpType::Patch => Version::new(self.major, self.minor, self.patch + 1),
        }
    }

    /// The bump kind that takes `from` to `self`, if `self` is exactly one
    /// bump ahead. Returns `None` for equal versions, backward steps, and
    /// multi-step jumps.
    pub fn bump_from(&self, from: &Version) -> Option<BumpType> {
        for kind in [BumpType::Major, BumpType::Minor, BumpType::Patch] {
            if from.bump(kind) == *self {
                return Some(kind);
            }
        }
        None
    }
}

fn parse_component(part: &str, whole: &str) -> Result<u64> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::Format(whole.to_string()));
    }
    part.parse::<u64>()
        .map_err(|_| Error::Format(whole.to_string()))
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Version::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Version::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Generate the stepping sequence from `current` (exclusive) to `target`
/// (inclusive): majors first, then minors, then patches.
///
/// This is the sequence a dense release history must have published, and
/// the planner checks the manifest chain against it. Empty when
/// `current >= target`.
pub fn intermediate_versions(current: Version, target: Version) -> Vec<Version> {
    if current >= target {
        return Vec::new();
    }

    let mut versions = Vec::new();
    let mut cursor = current;

    while cursor.major < target.major {
        cursor = cursor.bump(BumpType::Major);
        versions.push(cursor);
    }
    while cursor.minor < target.minor {
        cursor = cursor.bump(BumpType::Minor);
        versions.push(cursor);
    }
    while cursor.patch < target.patch {
        cursor = cursor.bump(BumpType::Patch);
        versions.push(cursor);
    }

    versions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let v = Version::parse("1.2.3").unwrap();
        assert_eq!(v, Version::new(1, 2, 3));
    }

    #[test]
    fn test_parse_tag_prefix() {
        assert_eq!(Version::parse("v1.2.3").unwrap(), Version::new(1, 2, 3));
        assert_eq!(Version::parse("V0.1.0").unwrap(), Version::new(0, 1, 0));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "1", "1.2", "1.2.3.4", "a.b.c", "1.2.x", "1..3", "-1.0.0", "1.0.0-rc1"] {
            assert!(Version::parse(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_render_parse_round_trip() {
        for s in ["0.0.0", "1.2.3", "10.20.30", "123.0.7"] {
            assert_eq!(Version::parse(s).unwrap().to_string(), s);
        }
    }

    #[test]
    fn test_total_order() {
        let a = Version::new(1, 2, 3);
        let b = Version::new(1, 3, 0);
        let c = Version::new(2, 0, 0);
        assert!(a < b && b < c && a < c);
        assert!(Version::new(1, 2, 3) == a);
        assert!(Version::new(1, 2, 4) > a);
    }

    #[test]
    fn test_bump_zeroes_lower_components() {
        let v = Version::new(1, 4, 7);
        assert_eq!(v.bump(BumpType::Major), Version::new(2, 0, 0));
        assert_eq!(v.bump(BumpType::Minor), Version::new(1, 5, 0));
        assert_eq!(v.bump(BumpType::Patch), Version::new(1, 4, 8));
    }

    #[test]
    fn test_bump_from() {
        let base = Version::new(1, 1, 1);
        assert_eq!(Version::new(2, 0, 0).bump_from(&base), Some(BumpType::Major));
        assert_eq!(Version::new(1, 2, 0).bump_from(&base), Some(BumpType::Minor));
        assert_eq!(Version::new(1, 1, 2).bump_from(&base), Some(BumpType::Patch));
        assert_eq!(base.bump_from(&base), None);
        assert_eq!(Version::new(1, 3, 0).bump_from(&base), None);
        assert_eq!(Version::new(1, 0, 0).bump_from(&base), None);
    }

    #[test]
    fn test_bump_strength_order() {
        assert!(BumpType::Major > BumpType::Minor);
        assert!(BumpType::Minor > BumpType::Patch);
    }

    #[test]
    fn test_intermediate_versions_stepping() {
        let steps = intermediate_versions(Version::new(1, 0, 0), Version::new(1, 2, 0));
        assert_eq!(steps, vec![Version::new(1, 1, 0), Version::new(1, 2, 0)]);

        let steps = intermediate_versions(Version::new(1, 0, 0), Version::new(2, 1, 1));
        assert_eq!(
            steps,
            vec![
                Version::new(2, 0, 0),
                Version::new(2, 1, 0),
                Version::new(2, 1, 1)
            ]
        );
    }

    #[test]
    fn test_intermediate_versions_no_forward_step() {
        assert!(intermediate_versions(Version::new(1, 0, 0), Version::new(1, 0, 0)).is_empty());
        assert!(intermediate_versions(Version::new(2, 0, 0), Version::new(1, 9, 9)).is_empty());
    }

    #[test]
    fn test_serde_as_string() {
        let v = Version::new(1, 2, 3);
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"1.2.3\"");
        let back: Version = serde_json::from_str("\"v2.0.0\"").unwrap();
        assert_eq!(back, Version::new(2, 0, 0));
    }
}
