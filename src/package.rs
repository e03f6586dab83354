//! Canonical package identity and metadata value types shared by the
//! provider, cache, and resolver.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constraint::Constraint;
use crate::version::Version;

/// The three repositories this system resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Cran,
    Bioc,
    Github,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Cran => "cran",
            Self::Bioc => "bioc",
            Self::Github => "github",
        };
        write!(f, "{s}")
    }
}

/// Tagged cross-source identity of a package. Two `PackageRef`s are equal
/// iff `source`, `name`, and `locator` are all equal — same-name packages
/// from different sources are distinct identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageRef {
    pub source: Source,
    pub name: String,
    /// The Bioconductor release for `bioc`, or `owner/repo[@ref]` for
    /// `github`. Absent for `cran`.
    pub locator: Option<String>,
}

impl PackageRef {
    pub fn cran(name: impl Into<String>) -> Self {
        Self {
            source: Source::Cran,
            name: name.into(),
            locator: None,
        }
    }

    pub fn bioc(name: impl Into<String>, release: impl Into<String>) -> Self {
        Self {
            source: Source::Bioc,
            name: name.into(),
            locator: Some(release.into()),
        }
    }

    pub fn github(owner_repo: impl Into<String>, git_ref: Option<String>) -> Self {
        let owner_repo = owner_repo.into();
        let locator = match git_ref {
            Some(r) => format!("{owner_repo}@{r}"),
            None => owner_repo.clone(),
        };
        Self {
            source: Source::Github,
            name: owner_repo,
            locator: Some(locator),
        }
    }

    /// The Bioconductor release this ref is pinned to, if any.
    pub fn bioc_release(&self) -> Option<&str> {
        match self.source {
            Source::Bioc => self.locator.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.locator {
            Some(l) => write!(f, "{}:{}", self.source, l),
            None => write!(f, "{}:{}", self.source, self.name),
        }
    }
}

/// The kind of a declared dependency edge. Only `Depends`, `Imports`, and
/// `LinkingTo` are active by default; `Suggests` is active only when the
/// manifest opts in (`ResolveOptions::include_optional`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    Depends,
    Imports,
    LinkingTo,
    Suggests,
}

impl EdgeKind {
    pub fn is_active(self, include_optional: bool) -> bool {
        match self {
            Self::Suggests => include_optional,
            _ => true,
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Depends => "Depends",
            Self::Imports => "Imports",
            Self::LinkingTo => "LinkingTo",
            Self::Suggests => "Suggests",
        };
        write!(f, "{s}")
    }
}

/// A declared dependency edge from one candidate on another package by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub name: String,
    pub constraint: Constraint,
    pub kind: EdgeKind,
}

/// A concrete version of a package, as returned by a [`crate::provider::MetadataProvider`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "ref")]
    pub package_ref: PackageRef,
    pub version: Version,
    pub r_floor: Option<Version>,
    pub depends: Vec<Edge>,
    pub bioc_release: Option<String>,
}

impl Candidate {
    /// Active edges, given whether `suggests` is opted in.
    pub fn active_edges(&self, include_optional: bool) -> impl Iterator<Item = &Edge> {
        self.depends
            .iter()
            .filter(move |e| e.kind.is_active(include_optional))
    }
}

/// A root requirement produced from a single manifest target.
#[derive(Debug, Clone)]
pub struct Requirement {
    pub package_ref: PackageRef,
    pub constraint: Constraint,
    pub optional: bool,
}
