//! Core data types for compromised packages, findings, and snapshots.
//!
//! This module contains the fundamental types used throughout npm-validator:
//!
//! - [`PackageEntry`] - A compromised package and its affected versions
//! - [`Finding`] - An installed version that exactly matches a compromised one
//! - [`Report`] - Complete scan results across every project
//! - [`CompromisedListSnapshot`] - The persisted compromised list
//!
//! # Example
//!
//! ```
//! use npm_validator::model::PackageEntry;
//!
//! let entry = PackageEntry::from_versions("left-pad", ["1.0.1", "1.0.0", "1.0.0"]).unwrap();
//! assert_eq!(entry.versions(), ["1.0.0", "1.0.1"]);
//! ```

mod package;
mod report;
mod snapshot;

pub use package::*;
pub use report::*;
pub use snapshot::*;

use std::collections::BTreeMap;

/// Package name to sorted, de-duplicated compromised versions.
pub type CompromisedMap = BTreeMap<String, Vec<String>>;

/// Invariant violations raised when constructing model values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("package name must be non-empty")]
    EmptyName,

    #[error("package '{0}' must contain at least one version")]
    NoVersions(String),

    #[error("package '{0}' has an empty version string")]
    EmptyVersion(String),

    #[error("versions of '{0}' must be sorted lexicographically")]
    Unsorted(String),

    #[error("versions of '{name}' must be unique (duplicate '{version}')")]
    Duplicate { name: String, version: String },

    #[error("invalid severity: {0}")]
    InvalidSeverity(String),

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("alert message must be non-empty")]
    EmptyMessage,

    #[error("at least one channel must be provided")]
    NoChannels,

    #[error("channels must be non-empty strings")]
    EmptyChannel,

    #[error("content hash must be a SHA-256 hex digest, got '{0}'")]
    InvalidHash(String),

    #[error("{0} must be provided")]
    MissingField(&'static str),
}
