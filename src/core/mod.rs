//! Shared error types used across the resolver and the ambient CLI/cache/fetch layers.

pub mod error;

pub use error::{ErrorContext, RverseError};
