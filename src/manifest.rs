//! YAML project-manifest parsing into resolver inputs.
//!
//! ```yaml
//! project:
//!   name: my-analysis
//! options:
//!   current_r: "4.3.0"
//!   prefer_bioc_release: "3.18"
//!   include_optional: false
//!   lock_r: "4.2.0"
//! targets:
//!   - package: dplyr
//!     source: cran
//!     constraint: ">=1.1.0"
//!   - package: DESeq2
//!     source: bioc
//!     bioc_release: "3.18"
//!   - package: tidyverse/readr
//!     source: github
//!     ref: main
//!     optional: true
//! ```
//!
//! A manifest can be malformed before the resolver ever runs, so parse
//! failures are reported through [`RverseError::ManifestError`] /
//! [`RverseError::InvalidTarget`], distinct from the resolver's own error
//! kinds.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constraint::Constraint;
use crate::core::error::RverseError;
use crate::package::{PackageRef, Requirement, Source};
use crate::resolver::ResolveOptions;
use crate::version::Version;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSection {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionsSection {
    pub current_r: Option<String>,
    pub prefer_bioc_release: Option<String>,
    #[serde(default)]
    pub include_optional: bool,
    pub lock_r: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSection {
    pub package: String,
    pub source: String,
    pub constraint: Option<String>,
    pub bioc_release: Option<String>,
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub project: ProjectSection,
    #[serde(default)]
    pub options: OptionsSection,
    #[serde(default)]
    pub targets: Vec<TargetSection>,
}

impl Manifest {
    /// Parse and validate a manifest from a path on disk.
    pub fn load(path: &Path) -> Result<Self, RverseError> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw, path)
    }

    /// Parse a manifest from an in-memory YAML document. `path` is used only
    /// to annotate errors.
    pub fn parse(raw: &str, path: &Path) -> Result<Self, RverseError> {
        let manifest: Self = serde_yaml::from_str(raw).map_err(|e| RverseError::ManifestError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        manifest.validate()?;
        debug!(
            targets = manifest.targets.len(),
            project = manifest.project.name,
            "parsed manifest"
        );
        Ok(manifest)
    }

    fn validate(&self) -> Result<(), RverseError> {
        for target in &self.targets {
            match target.source.as_str() {
                "cran" => {}
                "bioc" => {
                    if target.bioc_release.is_none() {
                        return Err(RverseError::InvalidTarget {
                            target: target.package.clone(),
                            reason: "bioc targets require a 'bioc_release'".to_string(),
                        });
                    }
                }
                "github" => {
                    if !target.package.contains('/') {
                        return Err(RverseError::InvalidTarget {
                            target: target.package.clone(),
                            reason: "github targets must be 'owner/repo'".to_string(),
                        });
                    }
                }
                other => {
                    return Err(RverseError::InvalidTarget {
                        target: target.package.clone(),
                        reason: format!("unknown source '{other}', expected cran/bioc/github"),
                    });
                }
            }
            if let Some(c) = &target.constraint {
                Constraint::parse(c)?;
            }
        }
        Ok(())
    }

    /// Lower the manifest into root [`Requirement`]s and [`ResolveOptions`]
    /// the resolver consumes.
    pub fn to_requirements(&self) -> Result<(Vec<Requirement>, ResolveOptions), RverseError> {
        let mut requirements = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            let package_ref = match target.source.as_str() {
                "cran" => PackageRef::cran(&target.package),
                "bioc" => PackageRef::bioc(
                    &target.package,
                    target.bioc_release.clone().unwrap_or_default(),
                ),
                "github" => PackageRef::github(&target.package, target.git_ref.clone()),
                other => {
                    return Err(RverseError::InvalidTarget {
                        target: target.package.clone(),
                        reason: format!("unknown source '{other}'"),
                    });
                }
            };
            let constraint = match &target.constraint {
                Some(c) => Constraint::parse(c)?,
                None => Constraint::any(),
            };
            requirements.push(Requirement {
                package_ref,
                constraint,
                optional: target.optional,
            });
        }

        let current_r = self
            .options
            .current_r
            .as_deref()
            .map(Version::parse)
            .transpose()?;
        let lock_r = self
            .options
            .lock_r
            .as_deref()
            .map(Version::parse)
            .transpose()?;

        let options = ResolveOptions {
            current_r,
            lock_r,
            prefer_bioc_release: self.options.prefer_bioc_release.clone(),
            include_optional: self.options.include_optional,
        };
        Ok((requirements, options))
    }
}

/// `Source` as it appears in a target's `source` field; used by `update-cache`
/// to dispatch to the right fetcher without re-deriving the mapping.
pub fn target_source(target: &TargetSection) -> Option<Source> {
    match target.source.as_str() {
        "cran" => Some(Source::Cran),
        "bioc" => Some(Source::Bioc),
        "github" => Some(Source::Github),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn path() -> PathBuf {
        PathBuf::from("project.yaml")
    }

    #[test]
    fn parses_minimal_manifest() {
        let yaml = "project:\n  name: demo\ntargets:\n  - package: dplyr\n    source: cran\n";
        let manifest = Manifest::parse(yaml, &path()).unwrap();
        assert_eq!(manifest.project.name, "demo");
        assert_eq!(manifest.targets.len(), 1);
    }

    #[test]
    fn bare_constraint_defaults_to_any() {
        let yaml = "project:\n  name: demo\ntargets:\n  - package: dplyr\n    source: cran\n";
        let manifest = Manifest::parse(yaml, &path()).unwrap();
        let (reqs, _) = manifest.to_requirements().unwrap();
        assert!(reqs[0].constraint.is_empty());
    }

    #[test]
    fn bioc_target_without_release_is_invalid() {
        let yaml = "project:\n  name: demo\ntargets:\n  - package: DESeq2\n    source: bioc\n";
        let err = Manifest::parse(yaml, &path()).unwrap_err();
        assert!(matches!(err, RverseError::InvalidTarget { .. }));
    }

    #[test]
    fn github_target_requires_owner_slash_repo() {
        let yaml = "project:\n  name: demo\ntargets:\n  - package: readr\n    source: github\n";
        let err = Manifest::parse(yaml, &path()).unwrap_err();
        assert!(matches!(err, RverseError::InvalidTarget { .. }));
    }

    #[test]
    fn malformed_yaml_is_manifest_error() {
        let yaml = "project: [this is not a mapping";
        let err = Manifest::parse(yaml, &path()).unwrap_err();
        assert!(matches!(err, RverseError::ManifestError { .. }));
    }

    #[test]
    fn lowers_full_options_block() {
        let yaml = "project:\n  name: demo\noptions:\n  current_r: \"4.3.0\"\n  lock_r: \"4.2.0\"\n  prefer_bioc_release: \"3.18\"\n  include_optional: true\ntargets:\n  - package: dplyr\n    source: cran\n    constraint: \">=1.1.0\"\n";
        let manifest = Manifest::parse(yaml, &path()).unwrap();
        let (reqs, options) = manifest.to_requirements().unwrap();
        assert_eq!(reqs.len(), 1);
        assert_eq!(options.current_r, Some(Version::parse("4.3.0").unwrap()));
        assert_eq!(options.lock_r, Some(Version::parse("4.2.0").unwrap()));
        assert_eq!(options.prefer_bioc_release.as_deref(), Some("3.18"));
        assert!(options.include_optional);
    }
}
