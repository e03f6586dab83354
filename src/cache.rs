//! The on-disk JSON metadata cache and its `MetadataProvider` implementation.
//!
//! Layout (see `SPEC_FULL.md` §6):
//!
//! ```text
//! <cache_dir>/cran/<name>.json
//! <cache_dir>/bioconductor/<release>.json
//! <cache_dir>/github/<owner>__<repo>/<ref>.json
//! ```
//!
//! `CacheMetadataProvider` never touches the network; refreshing the cache
//! is [`crate::fetch`]'s job, invoked by the `update-cache` subcommand.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::error::RverseError;
use crate::package::{Candidate, PackageRef, Source};
use crate::provider::MetadataProvider;

/// One CRAN entry on disk: every known version of a package, newest first.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CranEntry {
    pub candidates: Vec<Candidate>,
    /// When `update-cache` last wrote this entry. Absent for entries
    /// written before this field existed.
    #[serde(default)]
    pub fetched_at: Option<DateTime<Utc>>,
}

/// One Bioconductor release snapshot on disk: every package pinned to that
/// release, keyed by name.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BiocRelease {
    pub release: String,
    pub packages: std::collections::HashMap<String, Candidate>,
    #[serde(default)]
    pub fetched_at: Option<DateTime<Utc>>,
}

/// A single GitHub `DESCRIPTION` snapshot on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubEntry {
    pub candidate: Candidate,
    #[serde(default)]
    pub fetched_at: Option<DateTime<Utc>>,
}

/// Handle to the on-disk cache directory.
#[derive(Debug, Clone)]
pub struct Cache {
    root: PathBuf,
}

impl Cache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The default cache location: `$RVERSE_CACHE_DIR` if set (used by
    /// integration tests to isolate runs), else the teacher's
    /// `dirs::cache_dir()` convention (`~/.cache/rverse` on Linux, the
    /// platform equivalent elsewhere).
    pub fn default_root() -> Result<PathBuf, RverseError> {
        if let Ok(dir) = std::env::var("RVERSE_CACHE_DIR") {
            return Ok(PathBuf::from(dir));
        }
        dirs::cache_dir()
            .map(|p| p.join("rverse"))
            .ok_or_else(|| RverseError::CacheError {
                path: "<unresolvable>".to_string(),
                reason: "could not determine a platform cache directory".to_string(),
            })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn cran_path(&self, name: &str) -> PathBuf {
        self.root.join("cran").join(format!("{name}.json"))
    }

    fn bioc_path(&self, release: &str) -> PathBuf {
        self.root.join("bioconductor").join(format!("{release}.json"))
    }

    fn github_path(&self, owner_repo: &str, git_ref: &str) -> PathBuf {
        let dir = owner_repo.replace('/', "__");
        self.root
            .join("github")
            .join(dir)
            .join(format!("{git_ref}.json"))
    }

    fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, RverseError> {
        match fs::read_to_string(path) {
            Ok(raw) => {
                let value = serde_json::from_str(&raw).map_err(|e| RverseError::CacheError {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RverseError::CacheError {
                path: path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), RverseError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| RverseError::CacheError {
                path: parent.display().to_string(),
                reason: e.to_string(),
            })?;
        }
        let raw = serde_json::to_string_pretty(value).map_err(|e| RverseError::CacheError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        fs::write(path, raw).map_err(|e| RverseError::CacheError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    pub fn read_cran(&self, name: &str) -> Result<Option<CranEntry>, RverseError> {
        Self::read_json(&self.cran_path(name))
    }

    pub fn write_cran(&self, name: &str, entry: &CranEntry) -> Result<(), RverseError> {
        debug!(package = name, "writing CRAN cache entry");
        Self::write_json(&self.cran_path(name), entry)
    }

    pub fn read_bioc(&self, release: &str) -> Result<Option<BiocRelease>, RverseError> {
        Self::read_json(&self.bioc_path(release))
    }

    pub fn write_bioc(&self, release: &str, entry: &BiocRelease) -> Result<(), RverseError> {
        debug!(release, "writing Bioconductor cache entry");
        Self::write_json(&self.bioc_path(release), entry)
    }

    pub fn read_github(&self, owner_repo: &str, git_ref: &str) -> Result<Option<GithubEntry>, RverseError> {
        Self::read_json(&self.github_path(owner_repo, git_ref))
    }

    pub fn write_github(
        &self,
        owner_repo: &str,
        git_ref: &str,
        entry: &GithubEntry,
    ) -> Result<(), RverseError> {
        debug!(repo = owner_repo, git_ref, "writing GitHub cache entry");
        Self::write_json(&self.github_path(owner_repo, git_ref), entry)
    }
}

/// The shipped [`MetadataProvider`]: reads only from disk, never the network.
/// An absent cache file is not yet fetched, so it returns `Ok(vec![])` — the
/// same "nothing here" shape as a present-but-empty entry. Only an actual
/// I/O failure reading an existing file (corrupt JSON, permission denied)
/// surfaces as [`RverseError::MetadataUnavailable`]; `read_*` turns those
/// into `CacheError`, which this layer re-tags on the way out.
pub struct CacheMetadataProvider {
    cache: Cache,
}

impl CacheMetadataProvider {
    pub fn new(cache: Cache) -> Self {
        Self { cache }
    }

    fn unavailable(name: &str, err: RverseError) -> RverseError {
        warn!(package = name, %err, "cache read failed, treating metadata as unavailable");
        RverseError::MetadataUnavailable {
            name: name.to_string(),
            reason: err.to_string(),
        }
    }
}

impl MetadataProvider for CacheMetadataProvider {
    fn candidates(&self, package_ref: &PackageRef) -> Result<Vec<Candidate>, RverseError> {
        match package_ref.source {
            Source::Cran => Ok(self
                .cache
                .read_cran(&package_ref.name)
                .map_err(|e| Self::unavailable(&package_ref.name, e))?
                .map(|entry| entry.candidates)
                .unwrap_or_default()),
            Source::Bioc => {
                let release = package_ref.bioc_release().unwrap_or_default();
                let packages = self
                    .cache
                    .read_bioc(release)
                    .map_err(|e| Self::unavailable(&package_ref.name, e))?
                    .map(|entry| entry.packages)
                    .unwrap_or_default();
                Ok(packages.get(&package_ref.name).cloned().into_iter().collect())
            }
            Source::Github => {
                let locator = package_ref.locator.as_deref().unwrap_or(&package_ref.name);
                let (owner_repo, git_ref) = locator
                    .split_once('@')
                    .map(|(o, r)| (o, r))
                    .unwrap_or((locator, "HEAD"));
                Ok(self
                    .cache
                    .read_github(owner_repo, git_ref)
                    .map_err(|e| Self::unavailable(&package_ref.name, e))?
                    .map(|entry| vec![entry.candidate])
                    .unwrap_or_default())
            }
        }
    }
}
