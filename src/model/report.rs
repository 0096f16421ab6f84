use serde::{Deserialize, Serialize};

/// Schema version stamped on every [`Report`].
pub const REPORT_VERSION: &str = "1";

/// An installed version that is an exact member of a compromised list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub package: String,
    pub installed: String,
    /// The full compromised version list the installed version matched.
    pub compromised: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectReport {
    /// Project directory relative to the scan root (`.` for the root itself).
    pub path: String,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportTotals {
    pub projects: usize,
    pub findings: usize,
}

/// Terminal artifact of a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub version: String,
    pub has_findings: bool,
    pub projects: Vec<ProjectReport>,
    pub totals: ReportTotals,
}

impl Report {
    /// Iterates `(project path, finding)` pairs in report order.
    pub fn findings(&self) -> impl Iterator<Item = (&str, &Finding)> {
        self.projects
            .iter()
            .flat_map(|p| p.findings.iter().map(move |f| (p.path.as_str(), f)))
    }
}
