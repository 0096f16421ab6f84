//! Matching installed versions against compromised versions.
//!
//! The engine performs no I/O of its own beyond reading lockfiles in
//! [`scan_repository`]; the compromised mapping is built by the caller from
//! live feeds or a snapshot.

use std::path::Path;

use crate::discovery::discover_manifests;
use crate::inventory::{build_inventories, Inventory};
use crate::model::{CompromisedMap, Finding, ProjectReport, Report, ReportTotals, REPORT_VERSION};
use crate::parser::ManifestError;

/// Returns a finding for every inventory entry whose installed version is
/// an exact member of the compromised list for that package.
///
/// Matching is plain string equality: `1.0.0` never matches `v1.0.0` or
/// `^1.0.0`. Findings follow inventory iteration order.
pub fn match_inventory(inventory: &Inventory, compromised: &CompromisedMap) -> Vec<Finding> {
    inventory
        .iter()
        .filter_map(|(name, installed)| {
            let versions = compromised.get(name)?;
            versions.contains(installed).then(|| Finding {
                package: name.clone(),
                installed: installed.clone(),
                compromised: versions.clone(),
            })
        })
        .collect()
}

/// Wraps per-project findings into a [`Report`] with totals.
pub fn aggregate(projects: Vec<ProjectReport>) -> Report {
    let totals = ReportTotals {
        projects: projects.len(),
        findings: projects.iter().map(|p| p.findings.len()).sum(),
    };

    Report {
        version: REPORT_VERSION.to_string(),
        has_findings: totals.findings > 0,
        projects,
        totals,
    }
}

fn relative_path(dir: &Path, root: &Path) -> String {
    match dir.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel.display().to_string(),
        Err(_) => dir.display().to_string(),
    }
}

/// Discovers every project under `root`, builds its inventory and matches
/// it against `compromised`. Projects are ordered by relative path.
///
/// # Errors
///
/// Returns an error if any lockfile cannot be read or parsed.
pub fn scan_repository(root: &Path, compromised: &CompromisedMap) -> Result<Report, ManifestError> {
    let manifests = discover_manifests(root);
    let inventories = build_inventories(&manifests)?;

    let mut projects: Vec<ProjectReport> = inventories
        .iter()
        .map(|(dir, inventory)| {
            let findings = match_inventory(inventory, compromised);
            if !findings.is_empty() {
                tracing::warn!(
                    project = %dir.display(),
                    findings = findings.len(),
                    "compromised packages installed"
                );
            }
            ProjectReport {
                path: relative_path(dir, root),
                findings,
            }
        })
        .collect();
    projects.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(aggregate(projects))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compromised(pairs: &[(&str, &[&str])]) -> CompromisedMap {
        pairs
            .iter()
            .map(|(name, versions)| {
                (
                    name.to_string(),
                    versions.iter().map(|v| v.to_string()).collect(),
                )
            })
            .collect()
    }

    fn inventory(pairs: &[(&str, &str)]) -> Inventory {
        pairs
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_exact_match_only() {
        let map = compromised(&[("left-pad", &["1.0.0", "1.0.1"]), ("chalk", &["5.6.1"])]);
        let inv = inventory(&[
            ("left-pad", "1.0.0"),
            ("chalk", "v5.6.1"),
            ("debug", "4.4.2"),
        ]);

        let findings = match_inventory(&inv, &map);
        assert_eq!(
            findings,
            vec![Finding {
                package: "left-pad".to_string(),
                installed: "1.0.0".to_string(),
                compromised: vec!["1.0.0".to_string(), "1.0.1".to_string()],
            }]
        );
    }

    #[test]
    fn test_finding_iff_member() {
        let map = compromised(&[("a", &["1.0.0", "2.0.0"]), ("b", &["3.0.0"])]);
        let inv = inventory(&[("a", "2.0.0"), ("b", "3.0.1"), ("c", "1.0.0")]);

        let findings = match_inventory(&inv, &map);
        for (name, version) in &inv {
            let expected = map.get(name).is_some_and(|v| v.contains(version));
            let found = findings.iter().any(|f| &f.package == name && &f.installed == version);
            assert_eq!(expected, found, "{name}@{version}");
        }
    }

    #[test]
    fn test_aggregate_totals() {
        let finding = Finding {
            package: "a".to_string(),
            installed: "1".to_string(),
            compromised: vec!["1".to_string()],
        };
        let report = aggregate(vec![
            ProjectReport {
                path: "a".to_string(),
                findings: vec![finding.clone(), finding],
            },
            ProjectReport {
                path: "b".to_string(),
                findings: Vec::new(),
            },
        ]);

        assert!(report.has_findings);
        assert_eq!(report.totals.projects, 2);
        assert_eq!(report.totals.findings, 2);
        assert_eq!(report.version, REPORT_VERSION);
    }

    #[test]
    fn test_aggregate_empty() {
        let report = aggregate(Vec::new());
        assert!(!report.has_findings);
        assert_eq!(report.totals.projects, 0);
    }

    #[test]
    fn test_relative_path() {
        let root = Path::new("/repo");
        assert_eq!(relative_path(Path::new("/repo"), root), ".");
        assert_eq!(relative_path(Path::new("/repo/apps/web"), root), "apps/web");
    }
}
