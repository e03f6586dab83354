//! The resolver's output: an immutable, invariant-respecting assignment
//! plus the derived R-version verdict.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::package::{Candidate, Source};
use crate::version::Version;

/// One entry in the R-version change report: `name` is the package whose
/// `r_floor` is responsible (or `"<r-lock>"` when the change came from an
/// explicit `--lock-r` rather than any single package), `from`/`to` are the
/// previous and new R versions, and `reason` is a short human label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DowngradeEntry {
    pub name: String,
    pub from: Version,
    pub to: Version,
    pub reason: String,
}

/// Count of selected packages per source, for quick reporting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceSummary {
    pub cran: usize,
    pub bioc: usize,
    pub github: usize,
}

impl SourceSummary {
    pub fn from_assignment(assignment: &HashMap<String, Candidate>) -> Self {
        let mut summary = Self::default();
        for candidate in assignment.values() {
            match candidate.package_ref.source {
                Source::Cran => summary.cran += 1,
                Source::Bioc => summary.bioc += 1,
                Source::Github => summary.github += 1,
            }
        }
        summary
    }
}

/// The final, invariant-respecting assignment produced by the resolver,
/// plus the chosen R version. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    pub assignment: HashMap<String, Candidate>,
    pub r_version: Version,
    pub downgrades: Vec<DowngradeEntry>,
    pub source_summary: SourceSummary,
}

impl Solution {
    /// The package names that are transitive dependencies of a selected
    /// candidate but not of the selected candidate itself — used by the
    /// human report to render a tree; kept here rather than in `report`
    /// since it only needs the assignment, not any formatting concerns.
    pub fn depends_on(&self, name: &str) -> Vec<String> {
        self.assignment
            .get(name)
            .map(|c| c.depends.iter().map(|e| e.name.clone()).collect())
            .unwrap_or_default()
    }
}
