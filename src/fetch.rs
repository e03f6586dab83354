//! Best-effort network fetchers that populate [`crate::cache::Cache`].
//!
//! These are invoked only by the `update-cache` subcommand; the resolver
//! core never reaches for the network itself (`SPEC_FULL.md` §4.7). A
//! failed fetch is recorded as [`RverseError::FetchError`] and does not
//! abort the rest of the run — one unreachable package should not block a
//! refresh of everything else.

use std::collections::HashMap;

use chrono::Utc;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::cache::{BiocRelease, Cache, CranEntry, GithubEntry};
use crate::core::error::RverseError;
use crate::package::{Candidate, Edge, EdgeKind, PackageRef};
use crate::version::Version;

const USER_AGENT: &str = "rverse";

/// Fetches and caches the full version history of a single CRAN package.
pub struct CranFetcher {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct CrandbPackage {
    #[serde(default)]
    versions: HashMap<String, CrandbVersion>,
}

#[derive(Debug, Deserialize)]
struct CrandbVersion {
    #[serde(default, rename = "Depends")]
    depends: Option<String>,
    #[serde(default, rename = "Imports")]
    imports: Option<String>,
    #[serde(default, rename = "LinkingTo")]
    linking_to: Option<String>,
    #[serde(default, rename = "Suggests")]
    suggests: Option<String>,
}

/// Parses a candidate's `Depends`/`Imports`/`LinkingTo`/`Suggests` fields
/// into one combined, `R`-stripped edge list, computing the `R` floor along
/// the way.
fn candidate_edges(
    depends: Option<&str>,
    imports: Option<&str>,
    linking_to: Option<&str>,
    suggests: Option<&str>,
) -> (Option<Version>, Vec<Edge>) {
    let depends = parse_field_edges(depends, EdgeKind::Depends);
    let imports = parse_field_edges(imports, EdgeKind::Imports);
    let linking_to = parse_field_edges(linking_to, EdgeKind::LinkingTo);
    let suggests = parse_field_edges(suggests, EdgeKind::Suggests);

    let r_floor = depends
        .iter()
        .find(|e| e.name == "R")
        .and_then(|e| r_floor_from_constraint(&e.constraint));

    let edges = depends
        .into_iter()
        .chain(imports)
        .chain(linking_to)
        .chain(suggests)
        .filter(|e| e.name != "R")
        .collect();

    (r_floor, edges)
}

impl Default for CranFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl CranFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: "https://crandb.r-pkg.org".to_string(),
        }
    }

    pub async fn refresh(&self, name: &str, cache: &Cache) -> Result<(), RverseError> {
        let url = format!("{}/{}/all", self.base_url, name);
        debug!(package = name, %url, "fetching CRAN version history");

        let response = self
            .client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(|e| fetch_err(name, "cran", e))?;

        if !response.status().is_success() {
            return Err(RverseError::FetchError {
                name: name.to_string(),
                source: "cran".to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let parsed: CrandbPackage = response.json().await.map_err(|e| fetch_err(name, "cran", e))?;

        let mut candidates: Vec<Candidate> = parsed
            .versions
            .into_iter()
            .filter_map(|(version, meta)| {
                let version = Version::parse(&version).ok()?;
                let (r_floor, depends) = candidate_edges(
                    meta.depends.as_deref(),
                    meta.imports.as_deref(),
                    meta.linking_to.as_deref(),
                    meta.suggests.as_deref(),
                );
                Some(Candidate {
                    package_ref: PackageRef::cran(name),
                    version,
                    r_floor,
                    depends,
                    bioc_release: None,
                })
            })
            .collect();

        candidates.sort_by(|a, b| b.version.cmp(&a.version));
        cache.write_cran(
            name,
            &CranEntry {
                candidates,
                fetched_at: Some(Utc::now()),
            },
        )
    }
}

/// Fetches and caches one Bioconductor release's package snapshot.
pub struct BiocFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl Default for BiocFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl BiocFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: "https://bioconductor.org/packages/json".to_string(),
        }
    }

    pub async fn refresh(&self, release: &str, cache: &Cache) -> Result<(), RverseError> {
        let url = format!("{}/{}/bioc/packages.json", self.base_url, release);
        debug!(release, %url, "fetching Bioconductor release snapshot");

        let response = self
            .client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(|e| fetch_err(release, "bioc", e))?;

        if !response.status().is_success() {
            return Err(RverseError::FetchError {
                name: release.to_string(),
                source: "bioc".to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let raw: HashMap<String, CrandbVersion> =
            response.json().await.map_err(|e| fetch_err(release, "bioc", e))?;

        let mut packages = HashMap::new();
        for (name, meta) in raw {
            let (r_floor, depends) = candidate_edges(
                meta.depends.as_deref(),
                meta.imports.as_deref(),
                meta.linking_to.as_deref(),
                meta.suggests.as_deref(),
            );
            packages.insert(
                name.clone(),
                Candidate {
                    package_ref: PackageRef::bioc(&name, release),
                    // Bioconductor pins one version per release; the
                    // release manifest this endpoint serves doesn't carry
                    // it, so identity (name + release) is what the resolver
                    // actually keys on here, not this placeholder.
                    version: Version::parse("0").unwrap_or_else(|_| unreachable!()),
                    r_floor,
                    depends,
                    bioc_release: Some(release.to_string()),
                },
            );
        }

        cache.write_bioc(
            release,
            &BiocRelease {
                release: release.to_string(),
                packages,
                fetched_at: Some(Utc::now()),
            },
        )
    }
}

/// Fetches and caches a single GitHub package's `DESCRIPTION` at a ref.
pub struct GithubFetcher {
    client: reqwest::Client,
}

impl Default for GithubFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl GithubFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub async fn refresh(&self, owner_repo: &str, git_ref: &str, cache: &Cache) -> Result<(), RverseError> {
        let url = format!(
            "https://raw.githubusercontent.com/{owner_repo}/{git_ref}/DESCRIPTION"
        );
        debug!(repo = owner_repo, git_ref, %url, "fetching GitHub DESCRIPTION");

        let response = self
            .client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(|e| fetch_err(owner_repo, "github", e))?;

        if !response.status().is_success() {
            return Err(RverseError::FetchError {
                name: owner_repo.to_string(),
                source: "github".to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let body = response.text().await.map_err(|e| fetch_err(owner_repo, "github", e))?;
        let fields = parse_description(&body);

        let version = fields
            .get("Version")
            .and_then(|v| Version::parse(v).ok())
            .unwrap_or_else(|| Version::parse("0").unwrap_or_else(|_| unreachable!()));
        let (r_floor, depends) = candidate_edges(
            fields.get("Depends").map(String::as_str),
            fields.get("Imports").map(String::as_str),
            fields.get("LinkingTo").map(String::as_str),
            fields.get("Suggests").map(String::as_str),
        );

        let candidate = Candidate {
            package_ref: PackageRef::github(owner_repo, Some(git_ref.to_string())),
            version,
            r_floor,
            depends,
            bioc_release: None,
        };

        cache.write_github(
            owner_repo,
            git_ref,
            &GithubEntry {
                candidate,
                fetched_at: Some(Utc::now()),
            },
        )
    }
}

fn fetch_err(name: &str, source: &str, e: reqwest::Error) -> RverseError {
    warn!(package = name, source, error = %e, "fetch failed");
    RverseError::FetchError {
        name: name.to_string(),
        source: source.to_string(),
        reason: e.to_string(),
    }
}

/// Parses an R `DESCRIPTION`-style comma-separated field (`Depends`,
/// `Imports`) such as `"R (>= 4.1.0), dplyr (>= 1.1.0), rlang"` into edges.
fn parse_field_edges(field: Option<&str>, kind: EdgeKind) -> Vec<Edge> {
    let Some(field) = field else {
        return Vec::new();
    };
    let clause_re = Regex::new(r"^([A-Za-z0-9._]+)\s*(?:\(([^)]*)\))?$")
        .expect("clause regex is a fixed valid pattern");

    field
        .split(',')
        .filter_map(|clause| {
            let clause = clause.trim();
            if clause.is_empty() {
                return None;
            }
            let captures = clause_re.captures(clause)?;
            let name = captures.get(1)?.as_str();
            let constraint_src = captures.get(2).map(|m| m.as_str()).unwrap_or("");
            let constraint = crate::constraint::Constraint::parse(constraint_src).ok()?;
            Some(Edge {
                name: name.to_string(),
                constraint,
                kind,
            })
        })
        .collect()
}

/// Pulls a floor version out of an `R` constraint such as `>= 4.1.0`.
fn r_floor_from_constraint(constraint: &crate::constraint::Constraint) -> Option<Version> {
    let rendered = constraint.to_string();
    rendered
        .split_whitespace()
        .next_back()
        .and_then(|v| Version::parse(v).ok())
}

fn parse_description(body: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    let mut current_key: Option<String> = None;
    for line in body.lines() {
        if line.starts_with([' ', '\t']) {
            if let Some(key) = &current_key {
                if let Some(existing) = fields.get_mut(key) {
                    let existing: &mut String = existing;
                    existing.push(' ');
                    existing.push_str(line.trim());
                }
            }
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_string();
            fields.insert(key.clone(), value.trim().to_string());
            current_key = Some(key);
        }
    }
    fields
}
