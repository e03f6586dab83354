//! Tagged error hierarchy for rverse, mirrored after the teacher's two-type
//! split: a `thiserror` enum for precise matching, and an `ErrorContext`
//! wrapper that pairs an error with a user-facing suggestion for CLI display.

use std::fmt;

use colored::Colorize;
use thiserror::Error;

use crate::package::EdgeKind;

/// One link in the chain blamed for a `VersionConflict`: `parent` declared
/// an edge of `kind` with `constraint` against the package this error is
/// attached to.
#[derive(Debug, Clone)]
pub struct BlameLink {
    pub parent: String,
    pub kind: EdgeKind,
    pub constraint: String,
}

impl fmt::Display for BlameLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} --[{:?} {}]-->", self.parent, self.kind, self.constraint)
    }
}

/// All failure modes the resolver core and its ambient plumbing can surface.
#[derive(Error, Debug)]
pub enum RverseError {
    /// A version string did not match `\d+([.\-]\d+)*([.\-][A-Za-z0-9]+)?`.
    #[error("malformed version string: {input}")]
    MalformedVersion { input: String },

    /// A constraint string contained an unrecognized operator or syntax.
    #[error("malformed constraint string: {input}")]
    MalformedConstraint { input: String },

    /// A `MetadataProvider` returned no candidates for a ref that was
    /// explicitly requested (as opposed to discovered transitively).
    #[error("package '{name}' not found in {source}")]
    UnknownPackage { name: String, source: String },

    /// The backing source for a provider call was unreachable and no
    /// cached fallback existed.
    #[error("metadata for '{name}' unavailable: {reason}")]
    MetadataUnavailable { name: String, reason: String },

    /// Two root requirements named the same package from different sources.
    #[error("'{name}' is required from both {first} and {second}")]
    SourceConflict {
        name: String,
        first: String,
        second: String,
    },

    /// No candidate for `name` satisfied the accumulated constraint.
    #[error("no version of '{name}' satisfies {constraint}")]
    VersionConflict {
        name: String,
        constraint: String,
        chain: Vec<BlameLink>,
    },

    /// `lock_r` forbids a required `r_floor`.
    #[error("R {lock_r} is locked, but '{package}' requires R >= {r_floor}")]
    RLockUnsatisfiable {
        package: String,
        r_floor: String,
        lock_r: String,
    },

    /// Cooperative cancellation fired mid-search.
    #[error("resolution cancelled")]
    Cancelled,

    /// The YAML project manifest could not be parsed.
    #[error("failed to parse manifest {path}: {reason}")]
    ManifestError { path: String, reason: String },

    /// A manifest target failed validation (e.g. a github target missing
    /// `owner/repo`, or `bioc` missing a usable release).
    #[error("invalid manifest target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    /// Reading or writing the on-disk metadata cache failed.
    #[error("cache error at {path}: {reason}")]
    CacheError { path: String, reason: String },

    /// A best-effort fetcher could not refresh the cache for a package.
    #[error("failed to fetch '{name}' from {source}: {reason}")]
    FetchError {
        name: String,
        source: String,
        reason: String,
    },

    /// Wrapped [`std::io::Error`].
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Wrapped [`serde_json::Error`].
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Wrapped [`serde_yaml::Error`].
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// Catch-all for contexts that only have a message, not a precise kind.
    #[error("{message}")]
    Other { message: String },
}

impl RverseError {
    /// The CLI exit code this error kind maps to, per the §6 contract:
    /// `0` success, `1` resolution conflict, `2` manifest/config error,
    /// `3` metadata fetch failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::VersionConflict { .. }
            | Self::SourceConflict { .. }
            | Self::RLockUnsatisfiable { .. }
            | Self::Cancelled => 1,
            Self::ManifestError { .. } | Self::InvalidTarget { .. } | Self::Yaml(_) => 2,
            Self::MetadataUnavailable { .. }
            | Self::UnknownPackage { .. }
            | Self::CacheError { .. }
            | Self::FetchError { .. } => 3,
            Self::MalformedVersion { .. } | Self::MalformedConstraint { .. } => 2,
            Self::Io(_) | Self::Json(_) | Self::Other { .. } => 2,
        }
    }
}

/// Wraps an [`RverseError`] with an optional actionable suggestion and
/// extra details, the way the teacher's CLI presents failures to users.
#[derive(Debug)]
pub struct ErrorContext {
    pub error: RverseError,
    pub suggestion: Option<String>,
    pub details: Option<String>,
}

impl ErrorContext {
    pub fn new(error: RverseError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error, details, and suggestion to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);
        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }
        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.error.exit_code()
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        if let Some(details) = &self.details {
            write!(f, "\ndetails: {details}")?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nsuggestion: {suggestion}")?;
        }
        Ok(())
    }
}

/// Attach the suggestion a user most likely needs for a given error kind.
/// This is the single place new suggestions get added as new error
/// variants show up, mirroring the teacher's `user_friendly_error`.
pub fn user_friendly_error(error: RverseError) -> ErrorContext {
    let ctx = ErrorContext::new(error);
    match &ctx.error {
        RverseError::SourceConflict { name, .. } => ctx.with_suggestion(format!(
            "pick a single source for '{name}' in the manifest's targets"
        )),
        RverseError::VersionConflict { name, .. } => ctx.with_suggestion(format!(
            "relax the version constraint on '{name}' or one of its dependents"
        )),
        RverseError::RLockUnsatisfiable { package, .. } => ctx.with_suggestion(format!(
            "raise --lock-r, or pin an older version of '{package}'"
        )),
        RverseError::ManifestError { .. } => {
            ctx.with_suggestion("check the manifest's YAML syntax against the documented schema")
        }
        RverseError::MetadataUnavailable { name, .. } => ctx.with_suggestion(format!(
            "run 'rverse update-cache' to refresh metadata for '{name}'"
        )),
        _ => ctx,
    }
}
