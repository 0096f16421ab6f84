//! Lockfile and manifest parsers.
//!
//! This module provides the [`LockfileParser`] trait and one implementation
//! per supported lockfile grammar. Every parser turns a lockfile into the
//! resolved `(name, version)` pairs it pins.
//!
//! # Available Parsers
//!
//! | Parser | File | Format |
//! |--------|------|--------|
//! | [`PackageLockParser`] | `package-lock.json` | JSON (v1 and v2+) |
//! | [`YarnLockParser`] | `yarn.lock` | yarn line grammar |
//! | [`PnpmLockParser`] | `pnpm-lock.yaml` | YAML |
//!
//! `package.json` is not a lockfile; [`package_json::parse`] returns the
//! declared range expressions instead of resolved versions.
//!
//! # Example
//!
//! ```
//! use npm_validator::parser::{LockfileParser, YarnLockParser};
//! use std::path::Path;
//!
//! let content = "left-pad@^1.0.0:\n  version \"1.0.0\"\n";
//! let deps = YarnLockParser.parse(content, Path::new("yarn.lock")).unwrap();
//! assert_eq!(deps[0].name, "left-pad");
//! assert_eq!(deps[0].version, "1.0.0");
//! ```

pub mod package_json;
mod package_lock;
mod pnpm_lock;
mod yarn_lock;

pub use package_lock::PackageLockParser;
pub use pnpm_lock::PnpmLockParser;
pub use yarn_lock::YarnLockParser;

use std::fs;
use std::path::{Path, PathBuf};

use crate::discovery::ManifestKind;

/// A `(name, version)` pair read from a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Dependency {
    pub name: String,
    pub version: String,
}

impl Dependency {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// A manifest could not be read or its document structure is invalid.
///
/// Never recovered locally: an unreadable lockfile means the project's
/// inventory cannot be trusted.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },
}

impl ManifestError {
    pub(crate) fn parse(path: &Path, reason: impl std::fmt::Display) -> Self {
        ManifestError::Parse {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

pub(crate) fn read_manifest(path: &Path) -> Result<String, ManifestError> {
    fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Trait for extracting resolved dependencies from one lockfile format.
pub trait LockfileParser {
    /// The manifest kind this parser handles.
    fn kind(&self) -> ManifestKind;

    /// Parses lockfile content. `source_path` is only used in errors.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Parse`] when the top-level document is not
    /// valid for this format.
    fn parse(&self, content: &str, source_path: &Path) -> Result<Vec<Dependency>, ManifestError>;

    /// Reads and parses the lockfile at `path`.
    fn parse_path(&self, path: &Path) -> Result<Vec<Dependency>, ManifestError> {
        let content = read_manifest(path)?;
        self.parse(&content, path)
    }
}

/// Returns the parser for a lockfile kind, or `None` for `package.json`.
pub fn parser_for(kind: ManifestKind) -> Option<&'static dyn LockfileParser> {
    match kind {
        ManifestKind::PackageLock => Some(&PackageLockParser),
        ManifestKind::YarnLock => Some(&YarnLockParser),
        ManifestKind::PnpmLock => Some(&PnpmLockParser),
        ManifestKind::PackageJson => None,
    }
}
