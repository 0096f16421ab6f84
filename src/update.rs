//! Refreshing the compromised list from configured feeds.
//!
//! Enabled feeds are processed one after another. A feed that fails is
//! logged and left out; the run only fails when no feed succeeds.

use chrono::{DateTime, Utc};

use crate::config::Settings;
use crate::feed::{merge_aggregations, process_feed, Fetcher, NormalizedFeedAggregation};
use crate::model::{AlertMetadata, AlertSeverity, CompromisedListSnapshot, ModelError, SourceSnapshot};

/// Channel recorded on alerts raised by an update run.
pub const LOG_CHANNEL: &str = "log";

#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("no feeds are enabled")]
    NoEnabledFeeds,

    #[error("every enabled feed failed: {}", .0.join("; "))]
    AllFeedsFailed(Vec<String>),

    #[error(transparent)]
    Model(#[from] ModelError),
}

#[derive(Debug)]
pub struct UpdateOutcome {
    pub snapshot: CompromisedListSnapshot,
    pub aggregations: Vec<NormalizedFeedAggregation>,
    /// `feed_id: message` for each feed that was skipped.
    pub failures: Vec<String>,
}

/// Builds a fresh snapshot from every enabled feed in `settings`.
///
/// The snapshot's source URL lists the successful feeds' URLs joined by
/// spaces, and its content hash covers their payloads in feed order. When
/// `previous` is given, the change summary is computed against it. Partial
/// failures attach a `warn` alert naming the skipped feeds.
pub fn build_snapshot(
    fetcher: &dyn Fetcher,
    settings: &Settings,
    previous: Option<&CompromisedListSnapshot>,
    run_id: &str,
    retrieved_at: Option<DateTime<Utc>>,
) -> Result<UpdateOutcome, UpdateError> {
    let mut aggregations = Vec::new();
    let mut urls = Vec::new();
    let mut failures = Vec::new();

    for feed in settings.enabled_feeds() {
        match process_feed(fetcher, &feed.id, &feed.handler, &feed.url) {
            Ok(aggregation) => {
                urls.push(feed.url.as_str());
                aggregations.push(aggregation);
            }
            Err(e) => {
                tracing::warn!(feed = %feed.id, error = %e, "skipping failed feed");
                failures.push(format!("{}: {}", feed.id, e));
            }
        }
    }

    if aggregations.is_empty() {
        return Err(if failures.is_empty() {
            UpdateError::NoEnabledFeeds
        } else {
            UpdateError::AllFeedsFailed(failures)
        });
    }

    let content: Vec<u8> = aggregations
        .iter()
        .flat_map(|a| a.raw_payload.iter().copied())
        .collect();
    let source = SourceSnapshot::from_content(urls.join(" "), &content, run_id, retrieved_at)?;

    let merged = merge_aggregations(&aggregations);
    let mut snapshot = CompromisedListSnapshot::from_mapping(source, &merged)?;

    if let Some(previous) = previous {
        let summary = snapshot.diff(previous);
        tracing::info!(added = summary.added, removed = summary.removed, "compared with previous snapshot");
        snapshot = snapshot.with_change_summary(summary);
    }

    if !failures.is_empty() {
        let alert = AlertMetadata::new(
            AlertSeverity::Warn,
            format!("{} feed(s) failed: {}", failures.len(), failures.join("; ")),
            [LOG_CHANNEL],
        )?;
        snapshot = snapshot.with_alert(alert);
    }

    Ok(UpdateOutcome {
        snapshot,
        aggregations,
        failures,
    })
}
