//! Revision identifiers: `<base letter>v<major>r<revision>`, for example `av1r3`.
//!
//! The base letter names a lineage. Editing the letter in a document header by hand is how
//! a user declares a fresh start (a rebase), so [`RevisionId::is_rebase`] compares bases only.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;

static REVISION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z])v(\d+)r(\d+)$").expect("revision pattern is valid"));

pub const DEFAULT_REVISION: &str = "av1r1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RevisionId {
    pub base: char,
    pub major: u32,
    pub revision: u32,
}

impl Default for RevisionId {
    fn default() -> Self {
        Self {
            base: 'a',
            major: 1,
            revision: 1,
        }
    }
}

impl RevisionId {
    /// Parse a revision token. Anything that does not match, including zero counters,
    /// yields `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let caps = REVISION_RE.captures(s.trim())?;
        let base = caps[1].chars().next()?;
        let major: u32 = caps[2].parse().ok()?;
        let revision: u32 = caps[3].parse().ok()?;
        if major == 0 || revision == 0 {
            return None;
        }
        Some(Self {
            base,
            major,
            revision,
        })
    }

    /// Canonical text, with an absent id formatted as the default.
    pub fn format(id: Option<&RevisionId>) -> String {
        id.map_or_else(|| DEFAULT_REVISION.to_string(), RevisionId::to_string)
    }

    pub fn bump_revision(&self) -> Self {
        Self {
            revision: self.revision.saturating_add(1),
            ..*self
        }
    }

    pub fn bump_major(&self) -> Self {
        Self {
            major: self.major.saturating_add(1),
            revision: 1,
            ..*self
        }
    }

    pub fn is_rebase(old: &RevisionId, new: &RevisionId) -> bool {
        old.base != new.base
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}r{}", self.base, self.major, self.revision)
    }
}

impl std::str::FromStr for RevisionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RevisionId::parse(s).ok_or_else(|| format!("Invalid revision: {}", s))
    }
}

impl Serialize for RevisionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rev(base: char, major: u32, revision: u32) -> RevisionId {
        RevisionId {
            base,
            major,
            revision,
        }
    }

    #[test]
    fn test_parse_and_format() {
        assert_eq!(RevisionId::parse("av1r1"), Some(rev('a', 1, 1)));
        assert_eq!(RevisionId::parse(" cv12r340 "), Some(rev('c', 12, 340)));
        assert_eq!(rev('b', 2, 7).to_string(), "bv2r7");
        assert_eq!(RevisionId::format(None), "av1r1");
        assert_eq!(RevisionId::format(Some(&rev('d', 3, 1))), "dv3r1");
    }

    #[test]
    fn test_invalid_text_is_absent() {
        for text in ["", "av1", "Av1r1", "a1r1", "av0r1", "av1r0", "av1r1x", "unknown"] {
            assert_eq!(RevisionId::parse(text), None, "{text:?}");
        }
    }

    #[test]
    fn test_bump_revision_is_monotonic() {
        for r in [rev('a', 1, 1), rev('q', 4, 99), rev('z', 1, 1000)] {
            let bumped = r.bump_revision();
            assert_eq!(bumped.revision, r.revision + 1);
            assert_eq!((bumped.base, bumped.major), (r.base, r.major));
        }
    }

    #[test]
    fn test_bump_major_resets_revision() {
        let r = rev('b', 3, 9);
        assert_eq!(r.bump_major(), rev('b', 4, 1));
    }

    #[test]
    fn test_rebase_detection() {
        let a = rev('a', 1, 1);
        assert!(!RevisionId::is_rebase(&a, &a));
        assert!(!RevisionId::is_rebase(&a, &rev('a', 5, 2)));
        assert!(RevisionId::is_rebase(&a, &rev('b', 1, 1)));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("av2r3".parse::<RevisionId>(), Ok(rev('a', 2, 3)));
        assert!("nope".parse::<RevisionId>().is_err());
    }
}
