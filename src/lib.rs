//! rverse: a dependency resolver for R project environments spanning CRAN,
//! Bioconductor, and GitHub.
//!
//! The core (`version`, `constraint`, `package`, `provider`, `solution`,
//! `resolver`) is a synchronous backtracking search with no knowledge of
//! the network or the filesystem; it is driven entirely through the
//! [`provider::MetadataProvider`] seam. Everything else (`manifest`,
//! `cache`, `fetch`, `report`, `cli`) is the ambient stack that turns the
//! core into a runnable CLI: a YAML manifest loader, a disk-backed cache
//! and best-effort network fetchers that populate it, human/JSON report
//! rendering, and the `update-cache`/`solve` subcommands.

pub mod cache;
pub mod cli;
pub mod constraint;
pub mod core;
pub mod fetch;
pub mod manifest;
pub mod package;
pub mod provider;
pub mod report;
pub mod resolver;
pub mod solution;
pub mod version;
