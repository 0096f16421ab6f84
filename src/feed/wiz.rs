//! Wiz Research IOC feed (CSV).
//!
//! The payload has a header row with at least `Package` and `Version`
//! columns. A `Version` cell may hold several expressions joined by `||`,
//! each optionally prefixed with a comparator (`= 1.0.0`, `^2.1.0`).

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use super::http::{FetchError, Fetcher};
use super::{FeedAggregation, RecordUnit, SkippedRecord};

pub const WIZ_FEED_URL: &str = "https://raw.githubusercontent.com/wiz-sec-public/\
     wiz-research-iocs/main/reports/shai-hulud-2-packages.csv";

static COMPARATOR_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[=<>~^\s]+").expect("valid regex"));
static VERSION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Za-z.+-]+$").expect("valid regex"));

#[derive(Debug, thiserror::Error)]
pub enum WizError {
    #[error("failed to fetch Wiz feed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Wiz feed payload is missing headers")]
    MissingHeaders,

    #[error("Wiz feed missing required headers: Package, Version")]
    MissingRequiredHeaders,

    #[error("Wiz feed is not valid CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Wiz feed returned no valid package entries")]
    NoEntries,
}

pub fn fetch(fetcher: &dyn Fetcher, url: &str) -> Result<Vec<u8>, WizError> {
    Ok(fetcher.fetch(url)?)
}

/// Cleans every `||`-separated expression in a version cell.
///
/// Returns the offending expression when one does not reduce to a plain
/// version token.
fn normalize_versions(raw: &str) -> Result<Vec<String>, String> {
    let mut versions = Vec::new();
    for candidate in raw.split("||") {
        let candidate = candidate.trim();
        let cleaned = COMPARATOR_PREFIX.replace(candidate, "");
        let cleaned = cleaned.trim_start_matches('v');
        if cleaned.is_empty() {
            continue;
        }
        if !VERSION_PATTERN.is_match(cleaned) {
            return Err(candidate.to_string());
        }
        versions.push(cleaned.to_string());
    }
    Ok(versions)
}

/// Aggregates a CSV payload into `name -> sorted versions`.
///
/// Rows are numbered from 2 (the header is row 1). Defective rows are
/// recorded in `skipped_records`; the payload only fails on missing
/// headers or when no row yields a package.
pub fn aggregate_payload(payload: &[u8]) -> Result<FeedAggregation, WizError> {
    let text = String::from_utf8_lossy(payload);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(WizError::MissingHeaders);
    }
    let column = |name: &str| headers.iter().position(|h| h.trim() == name);
    let (Some(package_col), Some(version_col)) = (column("Package"), column("Version")) else {
        return Err(WizError::MissingRequiredHeaders);
    };

    let mut packages: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut skipped = Vec::new();
    let mut total = 0;

    for (idx, record) in reader.records().enumerate() {
        let row = idx + 2;
        total += 1;

        let record = match record {
            Ok(record) => record,
            Err(e) => {
                skipped.push(SkippedRecord::new(RecordUnit::Row, row, format!("malformed record ({e})")));
                continue;
            }
        };

        let name = record.get(package_col).unwrap_or("").trim();
        let version_field = record.get(version_col).unwrap_or("").trim();
        if name.is_empty() || version_field.is_empty() {
            skipped.push(SkippedRecord::new(RecordUnit::Row, row, "missing package or version"));
            continue;
        }

        let versions = match normalize_versions(version_field) {
            Ok(versions) => versions,
            Err(invalid) => {
                skipped.push(SkippedRecord::new(
                    RecordUnit::Row,
                    row,
                    format!("invalid version '{invalid}'"),
                ));
                continue;
            }
        };
        if versions.is_empty() {
            skipped.push(SkippedRecord::new(RecordUnit::Row, row, "no versions after normalization"));
            continue;
        }

        packages.entry(name.to_string()).or_default().extend(versions);
    }

    if packages.is_empty() {
        return Err(WizError::NoEntries);
    }

    Ok(FeedAggregation::from_sets(packages, total, skipped))
}
