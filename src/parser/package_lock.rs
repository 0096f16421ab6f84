use serde_json::Value;
use std::path::Path;

use super::{Dependency, LockfileParser, ManifestError};
use crate::discovery::ManifestKind;

const NODE_MODULES_PREFIX: &str = "node_modules/";

/// Parser for npm's `package-lock.json`.
///
/// Reads the v2+ flat `packages` map first, then the legacy v1
/// `dependencies` map. Only the top level of the v1 tree is read;
/// dependencies nested inside a v1 entry are not walked.
pub struct PackageLockParser;

fn version_of(meta: &Value) -> Option<String> {
    match meta.get("version")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl LockfileParser for PackageLockParser {
    fn kind(&self) -> ManifestKind {
        ManifestKind::PackageLock
    }

    fn parse(&self, content: &str, source_path: &Path) -> Result<Vec<Dependency>, ManifestError> {
        let doc: Value =
            serde_json::from_str(content).map_err(|e| ManifestError::parse(source_path, e))?;
        let doc = doc
            .as_object()
            .ok_or_else(|| ManifestError::parse(source_path, "expected a JSON object"))?;

        let mut deps = Vec::new();

        // v2+: "node_modules/<name>" keys; nested paths keep everything
        // after the first prefix.
        if let Some(Value::Object(packages)) = doc.get("packages") {
            for (key, meta) in packages {
                let Some(name) = key.strip_prefix(NODE_MODULES_PREFIX) else {
                    continue;
                };
                if let Some(version) = version_of(meta) {
                    deps.push(Dependency::new(name, version));
                }
            }
        }

        // v1
        if let Some(Value::Object(dependencies)) = doc.get("dependencies") {
            for (name, meta) in dependencies {
                if let Some(version) = version_of(meta) {
                    deps.push(Dependency::new(name.as_str(), version));
                }
            }
        }

        Ok(deps)
    }
}
