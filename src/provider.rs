//! The abstract metadata oracle the resolver pulls candidates through.
//!
//! `MetadataProvider` is the seam between the resolver core and whatever
//! backs it — in the shipped CLI, [`crate::cache::CacheMetadataProvider`].
//! The resolver never constructs a provider itself; it is always injected,
//! matching the teacher's preference for dependency injection over an
//! ambient cache handle (see `SPEC_FULL.md` §9).

use crate::core::error::RverseError;
use crate::package::{Candidate, PackageRef};

/// Yields [`Candidate`]s for a [`PackageRef`], newest-first (with the
/// bioc/github exception of returning exactly one candidate — see
/// `SPEC_FULL.md` §4.3).
pub trait MetadataProvider {
    /// Returns the candidate list in descending preference order. An empty
    /// `Ok(vec![])` means the ref is recognized but has no matching
    /// versions; `Err(MetadataUnavailable)` means the source could not be
    /// consulted at all (no cache entry, no network).
    fn candidates(&self, package_ref: &PackageRef) -> Result<Vec<Candidate>, RverseError>;
}

/// An in-memory [`MetadataProvider`] used by resolver tests (and available
/// to downstream integration tests via the `test-utils` feature) so the
/// search can be exercised without touching disk.
#[cfg(any(test, feature = "test-utils"))]
pub mod fake {
    use std::collections::HashMap;

    use super::*;

    #[derive(Default)]
    pub struct FakeProvider {
        by_ref: HashMap<PackageRef, Vec<Candidate>>,
    }

    impl FakeProvider {
        pub fn new() -> Self {
            Self::default()
        }

        /// Register candidates for a ref, in the order they should be
        /// offered (the caller is responsible for newest-first ordering).
        pub fn with(mut self, package_ref: PackageRef, candidates: Vec<Candidate>) -> Self {
            self.by_ref.insert(package_ref, candidates);
            self
        }
    }

    impl MetadataProvider for FakeProvider {
        fn candidates(&self, package_ref: &PackageRef) -> Result<Vec<Candidate>, RverseError> {
            Ok(self.by_ref.get(package_ref).cloned().unwrap_or_default())
        }
    }
}
