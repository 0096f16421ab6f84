use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::ModelError;

/// A compromised package and the versions known to be affected.
///
/// `versions` is always non-empty, sorted lexicographically and free of
/// duplicates. Use [`PackageEntry::from_versions`] to build one from
/// arbitrary input; [`PackageEntry::new`] rejects anything that does not
/// already satisfy the invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPackageEntry")]
pub struct PackageEntry {
    name: String,
    versions: Vec<String>,
}

#[derive(Deserialize)]
struct RawPackageEntry {
    name: String,
    versions: Vec<String>,
}

impl TryFrom<RawPackageEntry> for PackageEntry {
    type Error = ModelError;

    fn try_from(raw: RawPackageEntry) -> Result<Self, Self::Error> {
        PackageEntry::new(raw.name, raw.versions)
    }
}

impl PackageEntry {
    /// Builds an entry from an already normalized version list.
    pub fn new(name: impl Into<String>, versions: Vec<String>) -> Result<Self, ModelError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ModelError::EmptyName);
        }
        if versions.is_empty() {
            return Err(ModelError::NoVersions(name));
        }
        if versions.iter().any(|v| v.is_empty()) {
            return Err(ModelError::EmptyVersion(name));
        }
        for pair in versions.windows(2) {
            if pair[0] == pair[1] {
                return Err(ModelError::Duplicate {
                    version: pair[0].clone(),
                    name,
                });
            }
            if pair[0] > pair[1] {
                return Err(ModelError::Unsorted(name));
            }
        }

        Ok(Self { name, versions })
    }

    /// Builds an entry from any iterable of versions, sorting and
    /// de-duplicating them first.
    pub fn from_versions<I, S>(name: impl Into<String>, versions: I) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let unique: BTreeSet<String> = versions.into_iter().map(Into::into).collect();
        Self::new(name, unique.into_iter().collect())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn versions(&self) -> &[String] {
        &self.versions
    }

    pub fn into_parts(self) -> (String, Vec<String>) {
        (self.name, self.versions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_from_versions_sorts_and_dedupes() {
        let entry = PackageEntry::from_versions("chalk", ["5.6.1", "5.6.0", "5.6.1"]).unwrap();
        assert_eq!(entry.name(), "chalk");
        assert_eq!(entry.versions(), ["5.6.0", "5.6.1"]);
    }

    #[test]
    fn test_from_versions_rejects_empty_input() {
        let empty: [&str; 0] = [];
        assert_eq!(
            PackageEntry::from_versions("chalk", empty),
            Err(ModelError::NoVersions("chalk".to_string()))
        );
    }

    #[test]
    fn test_new_rejects_unsorted() {
        let result = PackageEntry::new("debug", strings(&["4.4.2", "4.4.1"]));
        assert_eq!(result, Err(ModelError::Unsorted("debug".to_string())));
    }

    #[test]
    fn test_new_rejects_duplicates() {
        let result = PackageEntry::new("debug", strings(&["4.4.2", "4.4.2"]));
        assert!(matches!(result, Err(ModelError::Duplicate { .. })));
    }

    #[test]
    fn test_new_rejects_empty_name_and_versions() {
        assert_eq!(
            PackageEntry::new("", strings(&["1.0.0"])),
            Err(ModelError::EmptyName)
        );
        assert_eq!(
            PackageEntry::new("debug", Vec::new()),
            Err(ModelError::NoVersions("debug".to_string()))
        );
        assert_eq!(
            PackageEntry::new("debug", strings(&["", "1.0.0"])),
            Err(ModelError::EmptyVersion("debug".to_string()))
        );
    }

    #[test]
    fn test_deserialize_enforces_invariant() {
        let ok: PackageEntry =
            serde_json::from_str(r#"{"name":"a","versions":["1.0.0","2.0.0"]}"#).unwrap();
        assert_eq!(ok.versions().len(), 2);

        let bad = serde_json::from_str::<PackageEntry>(r#"{"name":"a","versions":["2.0.0","1.0.0"]}"#);
        assert!(bad.is_err());
    }
}
