use std::path::Path;

use super::{Dependency, LockfileParser, ManifestError};
use crate::discovery::ManifestKind;

/// Parser for `yarn.lock`.
///
/// A block starts at an unindented line ending in `:` and ends at a blank
/// line. Only the first alias in the header names the package; the
/// indented `version` line inside the block gives the resolved version.
pub struct YarnLockParser;

/// Derives a package name from one header alias such as
/// `"@babel/core@^7.0.0"` or `lodash@^4.17.0`.
fn package_name(alias: &str) -> &str {
    let alias = alias.trim().trim_matches('"');
    if let Some(rest) = alias.strip_prefix('@') {
        // Scoped: name ends before the second `@`.
        match rest.find('@') {
            Some(idx) => &alias[..idx + 1],
            None => alias,
        }
    } else {
        alias.split('@').next().unwrap_or(alias)
    }
}

impl LockfileParser for YarnLockParser {
    fn kind(&self) -> ManifestKind {
        ManifestKind::YarnLock
    }

    fn parse(&self, content: &str, _source_path: &Path) -> Result<Vec<Dependency>, ManifestError> {
        let mut deps = Vec::new();
        let mut current: Option<&str> = None;

        for raw in content.lines() {
            let line = raw.trim_end();
            if line.is_empty() {
                current = None;
                continue;
            }

            if !line.starts_with(char::is_whitespace) && line.ends_with(':') {
                let header = &line[..line.len() - 1];
                let first = header.split(',').next().unwrap_or(header);
                current = Some(package_name(first)).filter(|name| !name.is_empty());
                continue;
            }

            let Some(name) = current else {
                continue;
            };
            if let Some(rest) = line.trim_start().strip_prefix("version ") {
                let value = rest.trim();
                let version = value
                    .strip_prefix('"')
                    .and_then(|v| v.strip_suffix('"'))
                    .unwrap_or(value);
                if !version.is_empty() {
                    deps.push(Dependency::new(name, version));
                }
                // One pair per block.
                current = None;
            }
        }

        Ok(deps)
    }
}
