//! Parsing and evaluation of version constraints: a comma-separated
//! conjunction of atomic `OP VERSION` predicates.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::error::RverseError;
use crate::version::Version;

/// A single comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    Ge,
    Gt,
    Le,
    Lt,
    Eq,
    Ne,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ge => ">=",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Lt => "<",
            Self::Eq => "==",
            Self::Ne => "!=",
        };
        write!(f, "{s}")
    }
}

/// One `OP VERSION` predicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Predicate {
    pub op: Op,
    pub version: Version,
}

impl Predicate {
    fn matches(&self, v: &Version) -> bool {
        match self.op {
            Op::Ge => v >= &self.version,
            Op::Gt => v > &self.version,
            Op::Le => v <= &self.version,
            Op::Lt => v < &self.version,
            Op::Eq => v == &self.version,
            Op::Ne => v != &self.version,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op, self.version)
    }
}

/// A conjunction of [`Predicate`]s. The empty conjunction is satisfied by
/// every version.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Constraint {
    predicates: Vec<Predicate>,
}

impl Constraint {
    /// The always-true constraint (no predicates).
    pub fn any() -> Self {
        Self::default()
    }

    /// Parse a comma-separated list of `OP VERSION` predicates. A bare
    /// version with no operator parses as `>= VERSION`. Whitespace is
    /// ignored. The empty string parses to [`Constraint::any`].
    pub fn parse(s: &str) -> Result<Self, RverseError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Self::any());
        }

        let mut predicates = Vec::new();
        for clause in trimmed.split(',') {
            let clause = clause.trim();
            if clause.is_empty() {
                return Err(RverseError::MalformedConstraint { input: s.to_string() });
            }
            predicates.push(parse_predicate(clause, s)?);
        }
        Ok(Self { predicates })
    }

    /// True iff every predicate in the conjunction holds for `v`.
    pub fn satisfies(&self, v: &Version) -> bool {
        self.predicates.iter().all(|p| p.matches(v))
    }

    /// Conjoin two constraints (concatenate their predicate lists).
    pub fn merge(&self, other: &Self) -> Self {
        let mut predicates = self.predicates.clone();
        predicates.extend(other.predicates.iter().cloned());
        Self { predicates }
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.predicates.iter().map(|p| p.to_string()).collect();
        write!(f, "{}", rendered.join(", "))
    }
}

fn parse_predicate(clause: &str, original: &str) -> Result<Predicate, RverseError> {
    const OPS: [(&str, Op); 7] = [
        (">=", Op::Ge),
        ("<=", Op::Le),
        ("==", Op::Eq),
        ("!=", Op::Ne),
        ("=", Op::Eq),
        (">", Op::Gt),
        ("<", Op::Lt),
    ];

    for (token, op) in OPS {
        if let Some(rest) = clause.strip_prefix(token) {
            let version = Version::parse(rest.trim())
                .map_err(|_| RverseError::MalformedConstraint { input: original.to_string() })?;
            return Ok(Predicate { op, version });
        }
    }

    // No operator: a bare version defaults to `>=`.
    let version = Version::parse(clause)
        .map_err(|_| RverseError::MalformedConstraint { input: original.to_string() })?;
    Ok(Predicate { op: Op::Ge, version })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_always_true() {
        let c = Constraint::parse("").unwrap();
        assert!(c.satisfies(&Version::parse("0.0.1").unwrap()));
        assert!(c.satisfies(&Version::parse("99.0.0").unwrap()));
    }

    #[test]
    fn bare_version_means_at_least() {
        let c = Constraint::parse("1.2.0").unwrap();
        assert!(c.satisfies(&Version::parse("1.2.0").unwrap()));
        assert!(c.satisfies(&Version::parse("2.0.0").unwrap()));
        assert!(!c.satisfies(&Version::parse("1.1.0").unwrap()));
    }

    #[test]
    fn equals_sign_alias() {
        let c = Constraint::parse("=1.0.0").unwrap();
        assert!(c.satisfies(&Version::parse("1.0.0").unwrap()));
        assert!(!c.satisfies(&Version::parse("1.0.1").unwrap()));
    }

    #[test]
    fn conjunction_of_clauses() {
        let c = Constraint::parse(">=1.0.0, <2.0.0").unwrap();
        assert!(c.satisfies(&Version::parse("1.5.0").unwrap()));
        assert!(!c.satisfies(&Version::parse("2.0.0").unwrap()));
        assert!(!c.satisfies(&Version::parse("0.9.0").unwrap()));
    }

    #[test]
    fn merge_is_conjunction() {
        let a = Constraint::parse(">=1.0.0").unwrap();
        let b = Constraint::parse("!=1.5.0").unwrap();
        let merged = a.merge(&b);
        assert!(merged.satisfies(&Version::parse("1.2.0").unwrap()));
        assert!(!merged.satisfies(&Version::parse("1.5.0").unwrap()));
        assert!(!merged.satisfies(&Version::parse("0.9.0").unwrap()));
    }

    #[test]
    fn merge_is_associative() {
        let a = Constraint::parse(">=1.0.0").unwrap();
        let b = Constraint::parse("<5.0.0").unwrap();
        let c = Constraint::parse("!=2.0.0").unwrap();
        let left = a.merge(&b).merge(&c);
        let right = a.merge(&b.merge(&c));
        for s in ["0.5.0", "1.0.0", "2.0.0", "4.9.0", "5.0.0"] {
            let v = Version::parse(s).unwrap();
            assert_eq!(left.satisfies(&v), right.satisfies(&v));
        }
    }

    #[test]
    fn malformed_constraint_is_rejected() {
        assert!(Constraint::parse(">= bogus").is_err());
        assert!(Constraint::parse(">=1.0.0,").is_err());
        assert!(Constraint::parse("~>1.0.0").is_err());
    }
}
