use serde_yaml::Value;
use std::path::Path;

use super::{Dependency, LockfileParser, ManifestError};
use crate::discovery::ManifestKind;

/// Parser for `pnpm-lock.yaml`.
///
/// Reads the keys of the `packages` mapping, which look like
/// `/name@1.2.3` or `/@scope/name@1.2.3`. The version is whatever follows
/// the last `@`.
pub struct PnpmLockParser;

fn split_key(key: &str) -> Option<(&str, &str)> {
    let reference = key.strip_prefix('/')?;
    let (name, version) = reference.rsplit_once('@')?;
    if name.is_empty() || version.is_empty() {
        return None;
    }
    Some((name, version))
}

impl LockfileParser for PnpmLockParser {
    fn kind(&self) -> ManifestKind {
        ManifestKind::PnpmLock
    }

    fn parse(&self, content: &str, source_path: &Path) -> Result<Vec<Dependency>, ManifestError> {
        let doc: Value =
            serde_yaml::from_str(content).map_err(|e| ManifestError::parse(source_path, e))?;

        let packages = match &doc {
            Value::Null => return Ok(Vec::new()),
            Value::Mapping(map) => match map.get("packages") {
                Some(Value::Mapping(packages)) => packages,
                _ => return Ok(Vec::new()),
            },
            _ => return Err(ManifestError::parse(source_path, "expected a YAML mapping")),
        };

        let deps = packages
            .keys()
            .filter_map(|key| key.as_str())
            .filter_map(split_key)
            .map(|(name, version)| Dependency::new(name, version))
            .collect();

        Ok(deps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCKFILE: &str = r#"lockfileVersion: '6.0'

dependencies:
  left-pad:
    specifier: ^1.0.0
    version: 1.0.0

packages:

  /left-pad@1.0.0:
    resolution: {integrity: sha512-abc}
    dev: false

  /@ctrl/tinycolor@4.1.1:
    resolution: {integrity: sha512-def}
    dev: false

  /legacy/1.0.0:
    resolution: {integrity: sha512-ghi}

  no-slash@1.0.0:
    resolution: {integrity: sha512-jkl}
"#;

    #[test]
    fn test_split_key() {
        assert_eq!(split_key("/left-pad@1.0.0"), Some(("left-pad", "1.0.0")));
        assert_eq!(
            split_key("/@scope/name@2.0.0"),
            Some(("@scope/name", "2.0.0"))
        );
        assert_eq!(split_key("/legacy/1.0.0"), None);
        assert_eq!(split_key("left-pad@1.0.0"), None);
    }

    #[test]
    fn test_parse_packages() {
        let deps = PnpmLockParser
            .parse(LOCKFILE, Path::new("pnpm-lock.yaml"))
            .unwrap();

        assert_eq!(
            deps,
            vec![
                Dependency::new("left-pad", "1.0.0"),
                Dependency::new("@ctrl/tinycolor", "4.1.1"),
            ]
        );
    }

    #[test]
    fn test_parse_is_idempotent() {
        let first = PnpmLockParser.parse(LOCKFILE, Path::new("pnpm-lock.yaml")).unwrap();
        let second = PnpmLockParser.parse(LOCKFILE, Path::new("pnpm-lock.yaml")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_parse_empty_document() {
        let deps = PnpmLockParser.parse("", Path::new("pnpm-lock.yaml")).unwrap();
        assert!(deps.is_empty());
    }

    #[test]
    fn test_parse_invalid_yaml_is_error() {
        let result = PnpmLockParser.parse("packages: [unclosed", Path::new("pnpm-lock.yaml"));
        assert!(matches!(result, Err(ManifestError::Parse { .. })));
    }
}
