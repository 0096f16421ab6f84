//! Per-project inventories of installed package versions.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::discovery::Manifest;
use crate::parser::{parser_for, ManifestError};

/// Installed package name to resolved version for one project.
pub type Inventory = BTreeMap<String, String>;

/// Groups manifests by project directory and merges every lockfile in that
/// directory into one inventory.
///
/// Lockfiles sharing a directory are applied in
/// [`merge_precedence`](crate::discovery::ManifestKind::merge_precedence)
/// order (`package-lock.json`, then `yarn.lock`, then `pnpm-lock.yaml`),
/// so a later format wins for a package present in several. Directories
/// holding only a `package.json` still appear, with an empty inventory.
///
/// # Errors
///
/// Any lockfile that cannot be read or parsed aborts the build.
pub fn build_inventories(manifests: &[Manifest]) -> Result<BTreeMap<PathBuf, Inventory>, ManifestError> {
    let mut ordered: Vec<&Manifest> = manifests.iter().collect();
    ordered.sort_by(|a, b| {
        a.project_dir()
            .cmp(b.project_dir())
            .then(a.kind.merge_precedence().cmp(&b.kind.merge_precedence()))
    });

    let mut projects: BTreeMap<PathBuf, Inventory> = BTreeMap::new();
    for manifest in ordered {
        let inventory = projects
            .entry(manifest.project_dir().to_path_buf())
            .or_default();

        let Some(parser) = parser_for(manifest.kind) else {
            continue;
        };

        let deps = parser.parse_path(&manifest.path)?;
        tracing::debug!(
            path = %manifest.path.display(),
            packages = deps.len(),
            "parsed lockfile"
        );
        for dep in deps {
            inventory.insert(dep.name, dep.version);
        }
    }

    Ok(projects)
}
