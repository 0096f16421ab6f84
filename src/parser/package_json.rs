//! Declared dependencies from `package.json`.
//!
//! Unlike the lockfile parsers this returns range expressions such as
//! `^1.2.0`, not resolved versions, so it never feeds an inventory.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use super::{read_manifest, Dependency, ManifestError};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageJson {
    #[serde(default)]
    dependencies: Option<BTreeMap<String, String>>,
    #[serde(default)]
    dev_dependencies: Option<BTreeMap<String, String>>,
    #[serde(default)]
    peer_dependencies: Option<BTreeMap<String, String>>,
    #[serde(default)]
    optional_dependencies: Option<BTreeMap<String, String>>,
}

/// Returns `(name, range)` pairs from every dependency section, in
/// section order.
pub fn parse(content: &str, source_path: &Path) -> Result<Vec<Dependency>, ManifestError> {
    let manifest: PackageJson =
        serde_json::from_str(content).map_err(|e| ManifestError::parse(source_path, e))?;

    let sections = [
        manifest.dependencies,
        manifest.dev_dependencies,
        manifest.peer_dependencies,
        manifest.optional_dependencies,
    ];

    Ok(sections
        .into_iter()
        .flatten()
        .flat_map(|section| section.into_iter().map(|(name, range)| Dependency::new(name, range)))
        .collect())
}

pub fn parse_path(path: &Path) -> Result<Vec<Dependency>, ManifestError> {
    let content = read_manifest(path)?;
    parse(&content, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_sections() {
        let deps = parse(
            r#"{
                "name": "app",
                "dependencies": { "chalk": "^5.6.0" },
                "devDependencies": { "jest": "~29.0.0" },
                "peerDependencies": { "react": ">=18 <20" },
                "optionalDependencies": { "fsevents": "2.3.3" }
            }"#,
            Path::new("package.json"),
        )
        .unwrap();

        assert_eq!(
            deps,
            vec![
                Dependency::new("chalk", "^5.6.0"),
                Dependency::new("jest", "~29.0.0"),
                Dependency::new("react", ">=18 <20"),
                Dependency::new("fsevents", "2.3.3"),
            ]
        );
    }

    #[test]
    fn test_parse_without_sections() {
        let deps = parse(r#"{"name": "empty"}"#, Path::new("package.json")).unwrap();
        assert!(deps.is_empty());
    }
}
