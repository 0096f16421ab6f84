//! Threat-intelligence feed ingestion.
//!
//! Every upstream feed is fetched as raw bytes and parsed into the same
//! canonical shape, [`NormalizedFeedAggregation`], so the rest of the
//! pipeline does not care which format a feed came in.
//!
//! # Available Handlers
//!
//! | Handler id | Format | Default source |
//! |------------|--------|----------------|
//! | `safedep` | line-delimited JSON | [`safedep::SAFEDEP_FEED_URL`] |
//! | `wiz` | CSV | [`wiz::WIZ_FEED_URL`] |
//!
//! # Example
//!
//! ```
//! use npm_validator::feed::{process_feed, FetchError};
//!
//! let fetcher = |_: &str| -> Result<Vec<u8>, FetchError> {
//!     Ok(b"{\"name\": \"left-pad\", \"version\": \"1.0.0\"}\n".to_vec())
//! };
//!
//! let agg = process_feed(&fetcher, "primary", "safedep", "https://example.test").unwrap();
//! assert_eq!(agg.feed_id, "primary");
//! assert_eq!(agg.package_count(), 1);
//! ```

pub mod http;
pub mod safedep;
pub mod wiz;

pub use http::{FetchError, Fetcher, HttpFetcher};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::model::CompromisedMap;

/// What a skipped record's index counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordUnit {
    Line,
    Row,
}

/// A feed record that was dropped during parsing, with its 1-based
/// position in the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub unit: RecordUnit,
    pub index: usize,
    pub cause: String,
}

impl SkippedRecord {
    pub fn new(unit: RecordUnit, index: usize, cause: impl Into<String>) -> Self {
        Self {
            unit,
            index,
            cause: cause.into(),
        }
    }
}

impl fmt::Display for SkippedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            RecordUnit::Line => "line",
            RecordUnit::Row => "row",
        };
        write!(f, "{} {}: {}", unit, self.index, self.cause)
    }
}

/// Output of a format-specific parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedAggregation {
    pub packages: CompromisedMap,
    pub total_records: usize,
    pub skipped_records: Vec<SkippedRecord>,
}

impl FeedAggregation {
    pub(crate) fn from_sets(
        packages: BTreeMap<String, BTreeSet<String>>,
        total_records: usize,
        skipped_records: Vec<SkippedRecord>,
    ) -> Self {
        Self {
            packages: packages
                .into_iter()
                .map(|(name, versions)| (name, versions.into_iter().collect()))
                .collect(),
            total_records,
            skipped_records,
        }
    }
}

/// Canonical representation of one processed feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedFeedAggregation {
    pub feed_id: String,
    pub display_name: String,
    pub packages: CompromisedMap,
    pub total_records: usize,
    pub skipped_records: Vec<SkippedRecord>,
    pub raw_payload: Vec<u8>,
}

impl NormalizedFeedAggregation {
    pub fn package_count(&self) -> usize {
        self.packages.len()
    }

    pub fn version_count(&self) -> usize {
        self.packages.values().map(Vec::len).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown feed ID '{handler_id}'. Known feeds: {}", .known.join(", "))]
pub struct UnknownFeedError {
    pub handler_id: String,
    pub known: Vec<String>,
}

/// Failure processing a single feed.
///
/// Every variant names the feed so callers can decide per feed whether to
/// abort the run or carry on with the feeds that succeeded.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error(transparent)]
    UnknownFeed(#[from] UnknownFeedError),

    #[error("feed '{feed_id}' fetch failed: {message}")]
    Fetch { feed_id: String, message: String },

    #[error("feed '{feed_id}' parse failed: {message}")]
    Parse { feed_id: String, message: String },
}

impl FeedError {
    pub fn is_fetch(&self) -> bool {
        matches!(self, FeedError::Fetch { .. })
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, FeedError::Parse { .. })
    }
}

/// Format-specific fetch and parse implementation for a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedHandler {
    SafeDep,
    Wiz,
}

impl FeedHandler {
    pub const ALL: [FeedHandler; 2] = [FeedHandler::SafeDep, FeedHandler::Wiz];

    pub fn id(&self) -> &'static str {
        match self {
            FeedHandler::SafeDep => "safedep",
            FeedHandler::Wiz => "wiz",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            FeedHandler::SafeDep => "SafeDep feed",
            FeedHandler::Wiz => "Wiz IOC feed",
        }
    }

    pub fn default_url(&self) -> &'static str {
        match self {
            FeedHandler::SafeDep => safedep::SAFEDEP_FEED_URL,
            FeedHandler::Wiz => wiz::WIZ_FEED_URL,
        }
    }

    /// Sorted ids of every registered handler.
    pub fn known_ids() -> Vec<&'static str> {
        let mut ids: Vec<&'static str> = Self::ALL.iter().map(|h| h.id()).collect();
        ids.sort_unstable();
        ids
    }

    /// Finds the handler registered under `handler_id`.
    pub fn lookup(handler_id: &str) -> Result<Self, UnknownFeedError> {
        Self::ALL
            .into_iter()
            .find(|h| h.id() == handler_id)
            .ok_or_else(|| UnknownFeedError {
                handler_id: handler_id.to_string(),
                known: Self::known_ids().into_iter().map(String::from).collect(),
            })
    }

    pub fn fetch(&self, fetcher: &dyn Fetcher, feed_id: &str, url: &str) -> Result<Vec<u8>, FeedError> {
        let result = match self {
            FeedHandler::SafeDep => safedep::fetch(fetcher, url).map_err(|e| e.to_string()),
            FeedHandler::Wiz => wiz::fetch(fetcher, url).map_err(|e| e.to_string()),
        };
        result.map_err(|message| FeedError::Fetch {
            feed_id: feed_id.to_string(),
            message,
        })
    }

    pub fn parse(&self, feed_id: &str, payload: &[u8]) -> Result<FeedAggregation, FeedError> {
        let result = match self {
            FeedHandler::SafeDep => safedep::aggregate_payload(payload).map_err(|e| e.to_string()),
            FeedHandler::Wiz => wiz::aggregate_payload(payload).map_err(|e| e.to_string()),
        };
        result.map_err(|message| FeedError::Parse {
            feed_id: feed_id.to_string(),
            message,
        })
    }
}

impl fmt::Display for FeedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Fetches and parses one feed through the handler named `handler_id`.
///
/// `feed_id` is the configured identifier carried into the result; several
/// configured feeds may share one handler.
///
/// # Errors
///
/// [`FeedError::UnknownFeed`] when the handler is not registered, otherwise
/// [`FeedError::Fetch`] or [`FeedError::Parse`] carrying the underlying
/// message.
pub fn process_feed(
    fetcher: &dyn Fetcher,
    feed_id: &str,
    handler_id: &str,
    url: &str,
) -> Result<NormalizedFeedAggregation, FeedError> {
    let handler = FeedHandler::lookup(handler_id)?;
    let raw_payload = handler.fetch(fetcher, feed_id, url)?;
    let aggregation = handler.parse(feed_id, &raw_payload)?;

    for skipped in &aggregation.skipped_records {
        tracing::warn!(feed = feed_id, "skipped record: {}", skipped);
    }
    tracing::info!(
        feed = feed_id,
        handler = handler.id(),
        records = aggregation.total_records,
        packages = aggregation.packages.len(),
        "processed feed"
    );

    Ok(NormalizedFeedAggregation {
        feed_id: feed_id.to_string(),
        display_name: handler.display_name().to_string(),
        packages: aggregation.packages,
        total_records: aggregation.total_records,
        skipped_records: aggregation.skipped_records,
        raw_payload,
    })
}

/// Unions the package mappings of several feeds, keeping versions sorted
/// and unique.
pub fn merge_aggregations<'a, I>(aggregations: I) -> CompromisedMap
where
    I: IntoIterator<Item = &'a NormalizedFeedAggregation>,
{
    let mut merged: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for aggregation in aggregations {
        for (name, versions) in &aggregation.packages {
            merged
                .entry(name.clone())
                .or_default()
                .extend(versions.iter().cloned());
        }
    }

    merged
        .into_iter()
        .map(|(name, versions)| (name, versions.into_iter().collect()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serving(body: &'static [u8]) -> impl Fn(&str) -> Result<Vec<u8>, FetchError> {
        move |_: &str| Ok(body.to_vec())
    }

    #[test]
    fn test_lookup_known_and_unknown() {
        assert_eq!(FeedHandler::lookup("wiz").unwrap(), FeedHandler::Wiz);

        let err = FeedHandler::lookup("nope").unwrap_err();
        assert_eq!(err.known, vec!["safedep", "wiz"]);
        assert_eq!(err.to_string(), "Unknown feed ID 'nope'. Known feeds: safedep, wiz");
    }

    #[test]
    fn test_process_feed_keeps_configured_id() {
        let fetcher = serving(b"Package,Version\nleft-pad,1.0.0\n");
        let agg = process_feed(&fetcher, "wiz-mirror", "wiz", "https://mirror.test/wiz.csv").unwrap();

        assert_eq!(agg.feed_id, "wiz-mirror");
        assert_eq!(agg.display_name, "Wiz IOC feed");
        assert_eq!(agg.package_count(), 1);
        assert_eq!(agg.version_count(), 1);
        assert_eq!(agg.raw_payload, b"Package,Version\nleft-pad,1.0.0\n");
    }

    #[test]
    fn test_process_feed_unknown_handler() {
        let fetcher = serving(b"");
        let err = process_feed(&fetcher, "x", "unknown-handler", "https://x").unwrap_err();
        assert!(matches!(err, FeedError::UnknownFeed(_)));
    }

    #[test]
    fn test_process_feed_wraps_fetch_error() {
        let fetcher = |url: &str| -> Result<Vec<u8>, FetchError> {
            Err(FetchError::Transport {
                url: url.to_string(),
                attempts: 3,
                message: "connection refused".to_string(),
            })
        };

        let err = process_feed(&fetcher, "sd", "safedep", "https://x").unwrap_err();
        assert!(err.is_fetch());
        assert!(err.to_string().contains("connection refused"));
        assert!(err.to_string().contains("'sd'"));
    }

    #[test]
    fn test_process_feed_wraps_parse_error() {
        let fetcher = serving(b"not,a,feed\n");
        let err = process_feed(&fetcher, "w", "wiz", "https://x").unwrap_err();
        assert!(err.is_parse());
        assert!(err.to_string().contains("Package, Version"));
    }

    #[test]
    fn test_merge_aggregations() {
        let safedep = process_feed(
            &serving(b"{\"name\":\"a\",\"version\":\"2.0.0\"}\n{\"name\":\"b\",\"version\":\"1.0.0\"}\n"),
            "safedep",
            "safedep",
            "https://x",
        )
        .unwrap();
        let wiz = process_feed(
            &serving(b"Package,Version\na,1.0.0 || 2.0.0\n"),
            "wiz",
            "wiz",
            "https://y",
        )
        .unwrap();

        let merged = merge_aggregations([&safedep, &wiz]);
        assert_eq!(merged["a"], vec!["1.0.0", "2.0.0"]);
        assert_eq!(merged["b"], vec!["1.0.0"]);
    }
}
