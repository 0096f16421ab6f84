use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::str::FromStr;

use super::{CompromisedMap, ModelError, PackageEntry};

/// Origin metadata for one compromised-list update run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSnapshot {
    pub retrieved_at: DateTime<Utc>,
    pub url: String,
    pub content_hash: String,
    pub run_id: String,
}

impl SourceSnapshot {
    pub fn new(
        retrieved_at: DateTime<Utc>,
        url: impl Into<String>,
        content_hash: impl Into<String>,
        run_id: impl Into<String>,
    ) -> Result<Self, ModelError> {
        let url = url.into();
        let content_hash = content_hash.into();
        let run_id = run_id.into();

        if url.is_empty() {
            return Err(ModelError::MissingField("url"));
        }
        if content_hash.len() != 64 || !content_hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ModelError::InvalidHash(content_hash));
        }
        if run_id.is_empty() {
            return Err(ModelError::MissingField("run id"));
        }

        Ok(Self {
            retrieved_at,
            url,
            content_hash,
            run_id,
        })
    }

    /// Hashes `content` with SHA-256 and stamps it with `retrieved_at`
    /// (or the current time).
    pub fn from_content(
        url: impl Into<String>,
        content: &[u8],
        run_id: impl Into<String>,
        retrieved_at: Option<DateTime<Utc>>,
    ) -> Result<Self, ModelError> {
        let digest = Sha256::digest(content);
        Self::new(
            retrieved_at.unwrap_or_else(Utc::now),
            url,
            format!("{:x}", digest),
            run_id,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeStatus {
    #[serde(rename = "updated")]
    Updated,
    #[serde(rename = "no-change")]
    NoChange,
    #[serde(rename = "failed")]
    Failed,
}

impl FromStr for ChangeStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "updated" => Ok(ChangeStatus::Updated),
            "no-change" => Ok(ChangeStatus::NoChange),
            "failed" => Ok(ChangeStatus::Failed),
            _ => Err(ModelError::InvalidStatus(s.to_string())),
        }
    }
}

/// Changes detected between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub added: usize,
    pub removed: usize,
    pub status: ChangeStatus,
}

impl ChangeSummary {
    pub fn from_counts(added: usize, removed: usize) -> Self {
        let status = if added == 0 && removed == 0 {
            ChangeStatus::NoChange
        } else {
            ChangeStatus::Updated
        };
        Self {
            added,
            removed,
            status,
        }
    }

    pub fn failed() -> Self {
        Self {
            added: 0,
            removed: 0,
            status: ChangeStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warn,
    Critical,
}

impl FromStr for AlertSeverity {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(AlertSeverity::Info),
            "warn" => Ok(AlertSeverity::Warn),
            "critical" => Ok(AlertSeverity::Critical),
            _ => Err(ModelError::InvalidSeverity(s.to_string())),
        }
    }
}

/// Alert payload emitted when an update run fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawAlertMetadata")]
pub struct AlertMetadata {
    severity: AlertSeverity,
    message: String,
    channels_notified: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAlertMetadata {
    severity: AlertSeverity,
    message: String,
    channels_notified: Vec<String>,
}

impl TryFrom<RawAlertMetadata> for AlertMetadata {
    type Error = ModelError;

    fn try_from(raw: RawAlertMetadata) -> Result<Self, Self::Error> {
        AlertMetadata::new(raw.severity, raw.message, raw.channels_notified)
    }
}

impl AlertMetadata {
    pub fn new<I, S>(
        severity: AlertSeverity,
        message: impl Into<String>,
        channels: I,
    ) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let message = message.into();
        let channels_notified: Vec<String> = channels.into_iter().map(Into::into).collect();

        if message.is_empty() {
            return Err(ModelError::EmptyMessage);
        }
        if channels_notified.is_empty() {
            return Err(ModelError::NoChannels);
        }
        if channels_notified.iter().any(|c| c.is_empty()) {
            return Err(ModelError::EmptyChannel);
        }

        Ok(Self {
            severity,
            message,
            channels_notified,
        })
    }

    pub fn severity(&self) -> AlertSeverity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn channels_notified(&self) -> &[String] {
        &self.channels_notified
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotTotals {
    pub packages: usize,
    pub versions: usize,
}

/// The persisted compromised package list.
///
/// Packages are kept sorted by name; `totals` is computed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompromisedListSnapshot {
    pub source: SourceSnapshot,
    pub packages: Vec<PackageEntry>,
    pub totals: SnapshotTotals,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_summary: Option<ChangeSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_metadata: Option<AlertMetadata>,
}

impl CompromisedListSnapshot {
    pub fn from_entries(
        source: SourceSnapshot,
        entries: impl IntoIterator<Item = PackageEntry>,
    ) -> Self {
        let mut packages: Vec<PackageEntry> = entries.into_iter().collect();
        packages.sort_by(|a, b| a.name().cmp(b.name()));

        let totals = SnapshotTotals {
            packages: packages.len(),
            versions: packages.iter().map(|p| p.versions().len()).sum(),
        };

        Self {
            source,
            packages,
            totals,
            change_summary: None,
            alert_metadata: None,
        }
    }

    pub fn from_mapping(source: SourceSnapshot, mapping: &CompromisedMap) -> Result<Self, ModelError> {
        let entries = mapping
            .iter()
            .map(|(name, versions)| PackageEntry::from_versions(name.as_str(), versions.iter().cloned()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_entries(source, entries))
    }

    pub fn with_change_summary(mut self, summary: ChangeSummary) -> Self {
        self.change_summary = Some(summary);
        self
    }

    pub fn with_alert(mut self, alert: AlertMetadata) -> Self {
        self.alert_metadata = Some(alert);
        self
    }

    pub fn packages_by_name(&self) -> BTreeMap<&str, &PackageEntry> {
        self.packages.iter().map(|p| (p.name(), p)).collect()
    }

    /// Counts package names added and removed relative to `previous`.
    pub fn diff(&self, previous: &CompromisedListSnapshot) -> ChangeSummary {
        let current = self.packages_by_name();
        let before = previous.packages_by_name();

        let added = current.keys().filter(|name| !before.contains_key(*name)).count();
        let removed = before.keys().filter(|name| !current.contains_key(*name)).count();

        ChangeSummary::from_counts(added, removed)
    }

    pub fn to_mapping(&self) -> CompromisedMap {
        self.packages
            .iter()
            .map(|p| (p.name().to_string(), p.versions().to_vec()))
            .collect()
    }
}
