//! Manifest discovery.
//!
//! Walks a directory tree and returns every npm manifest or lockfile it
//! finds, pruning vendored and tooling directories along the way.

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Directory names that are never descended into.
pub const EXCLUDED_DIRS: &[&str] = &["node_modules", ".git", ".venv"];

/// The kind of manifest, inferred from its filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ManifestKind {
    PackageJson,
    PackageLock,
    YarnLock,
    PnpmLock,
}

impl ManifestKind {
    pub const ALL: [ManifestKind; 4] = [
        ManifestKind::PackageJson,
        ManifestKind::PackageLock,
        ManifestKind::YarnLock,
        ManifestKind::PnpmLock,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            ManifestKind::PackageJson => "package.json",
            ManifestKind::PackageLock => "package-lock.json",
            ManifestKind::YarnLock => "yarn.lock",
            ManifestKind::PnpmLock => "pnpm-lock.yaml",
        }
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.file_name() == name)
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name()
            .and_then(|n| n.to_str())
            .and_then(Self::from_file_name)
    }

    pub fn is_lockfile(&self) -> bool {
        !matches!(self, ManifestKind::PackageJson)
    }

    /// Order in which lockfiles sharing a directory are merged into an
    /// inventory. Later entries overwrite earlier ones.
    pub fn merge_precedence(&self) -> u8 {
        match self {
            ManifestKind::PackageJson => 0,
            ManifestKind::PackageLock => 1,
            ManifestKind::YarnLock => 2,
            ManifestKind::PnpmLock => 3,
        }
    }
}

impl std::fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub path: PathBuf,
    pub kind: ManifestKind,
}

impl Manifest {
    /// The project directory this manifest belongs to.
    pub fn project_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }
}

fn is_excluded(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| EXCLUDED_DIRS.contains(&name))
}

/// Finds manifests anywhere under `root`, sorted by path.
///
/// A missing root yields an empty list.
pub fn discover_manifests(root: &Path) -> Vec<Manifest> {
    let mut manifests: Vec<Manifest> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_excluded(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let kind = ManifestKind::from_path(e.path())?;
            Some(Manifest {
                path: e.into_path(),
                kind,
            })
        })
        .collect();

    manifests.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!(root = %root.display(), count = manifests.len(), "discovered manifests");
    manifests
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "{}").unwrap();
    }

    #[test]
    fn test_manifest_kind_from_path() {
        assert_eq!(
            ManifestKind::from_path(Path::new("/a/yarn.lock")),
            Some(ManifestKind::YarnLock)
        );
        assert_eq!(ManifestKind::from_path(Path::new("/a/Cargo.lock")), None);
        assert!(!ManifestKind::PackageJson.is_lockfile());
    }

    #[test]
    fn test_discover_finds_all_kinds() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "package.json");
        touch(dir.path(), "package-lock.json");
        touch(dir.path(), "apps/web/yarn.lock");
        touch(dir.path(), "apps/api/pnpm-lock.yaml");
        touch(dir.path(), "apps/api/README.md");

        let found = discover_manifests(dir.path());
        let kinds: Vec<ManifestKind> = found.iter().map(|m| m.kind).collect();

        assert_eq!(found.len(), 4);
        assert!(kinds.contains(&ManifestKind::PnpmLock));
        assert!(kinds.contains(&ManifestKind::YarnLock));
    }

    #[test]
    fn test_discover_skips_excluded_dirs() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "package-lock.json");
        touch(dir.path(), "node_modules/left-pad/package.json");
        touch(dir.path(), "packages/a/node_modules/deep/nested/package-lock.json");
        touch(dir.path(), ".git/hooks/package.json");
        touch(dir.path(), ".venv/lib/yarn.lock");

        let found = discover_manifests(dir.path());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, dir.path().join("package-lock.json"));
    }

    #[test]
    fn test_discover_missing_root() {
        let dir = TempDir::new().unwrap();
        assert!(discover_manifests(&dir.path().join("missing")).is_empty());
    }
}
