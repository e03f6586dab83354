//! R-style version parsing, comparison, and ordering.
//!
//! R package versions are not semver: they are an arbitrary-length tuple of
//! non-negative integers separated by `.` or `-` (CRAN treats the two
//! separators as interchangeable), optionally followed by a non-numeric
//! suffix such as `-beta` that is preserved for display but does not
//! participate in ordering. `1.2` and `1.2.0` compare equal.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::error::RverseError;

/// A parsed R-style version: a tuple of numeric components plus whatever
/// non-numeric suffix followed them, kept only for display.
#[derive(Debug, Clone)]
pub struct Version {
    parts: Vec<u64>,
    suffix: Option<String>,
    original: String,
}

/// Serializes/deserializes as its original string (`"1.1.4"`), matching
/// every other version-shaped field in the cache and manifest formats —
/// the derived struct-of-parts shape would be unreadable on disk.
impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.original)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Version::parse(&raw).map_err(D::Error::custom)
    }
}

impl Version {
    /// Parse a version string of the form `\d+([.\-]\d+)*([.\-][A-Za-z0-9]+)?`.
    pub fn parse(s: &str) -> Result<Self, RverseError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(RverseError::MalformedVersion {
                input: s.to_string(),
            });
        }

        let normalized = trimmed.replace('-', ".");
        let mut segments = normalized.split('.').peekable();
        let mut parts = Vec::new();
        let mut suffix = None;

        while let Some(seg) = segments.next() {
            if seg.is_empty() {
                return Err(RverseError::MalformedVersion {
                    input: s.to_string(),
                });
            }
            match seg.parse::<u64>() {
                Ok(n) => parts.push(n),
                Err(_) => {
                    // A non-numeric segment is only valid as the final segment
                    // (a pre-release marker); anything after it is malformed.
                    if segments.peek().is_some() || !seg.chars().all(|c| c.is_ascii_alphanumeric())
                    {
                        return Err(RverseError::MalformedVersion {
                            input: s.to_string(),
                        });
                    }
                    suffix = Some(seg.to_string());
                }
            }
        }

        if parts.is_empty() {
            return Err(RverseError::MalformedVersion {
                input: s.to_string(),
            });
        }

        Ok(Self {
            parts,
            suffix,
            original: trimmed.to_string(),
        })
    }

    /// The non-numeric suffix a version carried, e.g. `"beta"` for `1.2-beta`.
    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }

    fn component(&self, index: usize) -> u64 {
        self.parts.get(index).copied().unwrap_or(0)
    }

    fn len(&self) -> usize {
        self.parts.len()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

impl FromStr for Version {
    type Err = RverseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.len().max(other.len());
        for i in 0..len {
            let ord = self.component(i).cmp(&other.component(i));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl std::hash::Hash for Version {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        // Hash on the trailing-zero-normalized tuple so that `1.2` and
        // `1.2.0` (which compare equal) also hash equal.
        let mut trimmed = self.parts.clone();
        while trimmed.last() == Some(&0) {
            trimmed.pop();
        }
        trimmed.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_zeros_compare_equal() {
        assert_eq!(Version::parse("1.2").unwrap(), Version::parse("1.2.0").unwrap());
        assert_eq!(Version::parse("1.0").unwrap(), Version::parse("1").unwrap());
    }

    #[test]
    fn dash_and_dot_separators_are_interchangeable() {
        assert_eq!(Version::parse("1-2-3").unwrap(), Version::parse("1.2.3").unwrap());
    }

    #[test]
    fn ordering_is_componentwise() {
        assert!(Version::parse("1.9.0").unwrap() < Version::parse("1.10.0").unwrap());
        assert!(Version::parse("2.0.0").unwrap() > Version::parse("1.99.99").unwrap());
    }

    #[test]
    fn prerelease_suffix_compares_as_zero_but_is_preserved() {
        let v = Version::parse("1.2-beta").unwrap();
        assert_eq!(v, Version::parse("1.2.0").unwrap());
        assert_eq!(v.suffix(), Some("beta"));
        assert_eq!(v.to_string(), "1.2-beta");
    }

    #[test]
    fn malformed_versions_are_rejected() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("abc").is_err());
        assert!(Version::parse("1..2").is_err());
        assert!(Version::parse("1.2.beta.3").is_err());
    }

    #[test]
    fn parse_format_round_trip() {
        for s in ["1.0.0", "4.4", "0.1-2", "2.3.4.5"] {
            let v = Version::parse(s).unwrap();
            assert_eq!(Version::parse(&v.to_string()).unwrap(), v);
        }
    }
}
