//! SafeDep malicious package feed (line-delimited JSON).
//!
//! Each non-blank line is one record such as
//! `{"name": "left-pad", "version": "1.0.0", ...}`.

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use super::http::{FetchError, Fetcher};
use super::{FeedAggregation, RecordUnit, SkippedRecord};

pub const SAFEDEP_FEED_URL: &str = "https://raw.githubusercontent.com/safedep/\
     shai-hulud-migration-response/main/data/ioc/malicious-package-versions.jsonl";

#[derive(Debug, thiserror::Error)]
pub enum SafeDepError {
    #[error("failed to fetch SafeDep feed: {0}")]
    Fetch(#[from] FetchError),

    #[error("SafeDep feed returned no valid package entries")]
    NoEntries,
}

pub fn fetch(fetcher: &dyn Fetcher, url: &str) -> Result<Vec<u8>, SafeDepError> {
    Ok(fetcher.fetch(url)?)
}

fn string_field(record: &Value, key: &str) -> Option<String> {
    let value = match record.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!value.is_empty()).then_some(value)
}

/// Aggregates a JSONL payload into `name -> sorted versions`.
///
/// Malformed lines are recorded in `skipped_records` with their 1-based
/// record number, counting non-blank lines only; the payload only fails
/// when no line yields a package.
pub fn aggregate_payload(payload: &[u8]) -> Result<FeedAggregation, SafeDepError> {
    let text = String::from_utf8_lossy(payload);
    let mut packages: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut skipped = Vec::new();
    let mut total = 0;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        total += 1;
        let line_no = total;

        let record: Value = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                skipped.push(SkippedRecord::new(
                    RecordUnit::Line,
                    line_no,
                    format!("invalid JSON ({e})"),
                ));
                continue;
            }
        };

        if !record.is_object() {
            skipped.push(SkippedRecord::new(RecordUnit::Line, line_no, "expected a JSON object"));
            continue;
        }

        match (string_field(&record, "name"), string_field(&record, "version")) {
            (Some(name), Some(version)) => {
                packages.entry(name).or_default().insert(version);
            }
            _ => skipped.push(SkippedRecord::new(
                RecordUnit::Line,
                line_no,
                "missing name or version",
            )),
        }
    }

    if packages.is_empty() {
        return Err(SafeDepError::NoEntries);
    }

    Ok(FeedAggregation::from_sets(packages, total, skipped))
}
