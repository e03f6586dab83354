//! Command-line interface: `update-cache` and `solve`.
//!
//! Mirrors the teacher's `--verbose`/`RUST_LOG` precedence and exit-code
//! contract, scoped down to the two subcommands this system needs.

use std::collections::HashSet;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::cache::{Cache, CacheMetadataProvider};
use crate::core::error::RverseError;
use crate::fetch::{BiocFetcher, CranFetcher, GithubFetcher};
use crate::manifest::Manifest;
use crate::report;
use crate::resolver;

#[derive(Parser)]
#[command(
    name = "rverse",
    about = "Dependency resolver for R project environments spanning CRAN, Bioconductor, and GitHub",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug-level logging. Equivalent to `RUST_LOG=debug` when
    /// `RUST_LOG` isn't already set.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh the on-disk metadata cache from CRAN, Bioconductor, and GitHub.
    UpdateCache {
        /// Path to the project manifest.
        #[arg(long, default_value = "project.yaml")]
        config: PathBuf,
    },
    /// Resolve a project manifest and print the solution.
    Solve {
        /// Path to the project manifest.
        path: PathBuf,
        /// Override the manifest's `lock_r` option.
        #[arg(long)]
        lock_r: Option<String>,
        /// Override the manifest's `prefer_bioc_release` option.
        #[arg(long)]
        prefer_bioc: Option<String>,
        /// Output format.
        #[arg(long, value_enum, default_value_t = Format::Human)]
        format: Format,
    },
}

#[derive(Copy, Clone, ValueEnum)]
pub enum Format {
    Human,
    Json,
}

impl Cli {
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub async fn run(self) -> Result<(), RverseError> {
        match self.command {
            Commands::UpdateCache { config } => update_cache(&config).await,
            Commands::Solve {
                path,
                lock_r,
                prefer_bioc,
                format,
            } => solve(&path, lock_r, prefer_bioc, format).await,
        }
    }
}

async fn update_cache(config: &PathBuf) -> Result<(), RverseError> {
    info!(path = %config.display(), "update-cache invoked");
    let manifest = Manifest::load(config)?;
    let cache = Cache::new(Cache::default_root()?);

    let cran_fetcher = CranFetcher::new();
    let bioc_fetcher = BiocFetcher::new();
    let github_fetcher = GithubFetcher::new();

    // Targets can repeat a (source, locator) pair via transitive discovery
    // elsewhere in the manifest; dedupe before firing off network calls.
    let mut seen = HashSet::new();
    let jobs: Vec<_> = manifest
        .targets
        .iter()
        .filter(|t| seen.insert((t.source.clone(), t.package.clone(), t.bioc_release.clone())))
        .collect();

    let pb = ProgressBar::new(jobs.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let fetches = jobs.iter().map(|target| {
        let message = target.package.clone();
        let pb = pb.clone();
        async move {
            pb.set_message(message);
            let result = match target.source.as_str() {
                "cran" => cran_fetcher.refresh(&target.package, &cache).await,
                "bioc" => {
                    let release = target.bioc_release.clone().unwrap_or_default();
                    bioc_fetcher.refresh(&release, &cache).await
                }
                "github" => {
                    let git_ref = target.git_ref.clone().unwrap_or_else(|| "HEAD".to_string());
                    github_fetcher.refresh(&target.package, &git_ref, &cache).await
                }
                _ => Ok(()),
            };
            pb.inc(1);
            result
        }
    });

    let results = join_all(fetches).await;
    pb.finish_and_clear();

    let failures: Vec<RverseError> = results.into_iter().filter_map(Result::err).collect();
    if let Some(first) = failures.into_iter().next() {
        return Err(first);
    }

    println!("cache refreshed at {}", cache.root().display());
    Ok(())
}

async fn solve(
    path: &PathBuf,
    lock_r: Option<String>,
    prefer_bioc: Option<String>,
    format: Format,
) -> Result<(), RverseError> {
    info!(path = %path.display(), "solve invoked");
    let manifest = Manifest::load(path)?;
    let (requirements, mut options) = manifest.to_requirements()?;

    if let Some(lock_r) = lock_r {
        options.lock_r = Some(crate::version::Version::parse(&lock_r)?);
    }
    if let Some(prefer_bioc) = prefer_bioc {
        options.prefer_bioc_release = Some(prefer_bioc);
    }

    let cache = Cache::new(Cache::default_root()?);
    let provider = CacheMetadataProvider::new(cache);
    let solution = resolver::resolve(&requirements, &provider, &options, || false)?;

    match format {
        Format::Human => println!("{}", report::render_human(&solution)),
        Format::Json => println!("{}", report::render_json(&solution)?),
    }
    Ok(())
}
