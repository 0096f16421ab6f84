pub mod compromised;
pub mod config;
pub mod discovery;
pub mod feed;
pub mod inventory;
pub mod matcher;
pub mod model;
pub mod output;
pub mod parser;
pub mod update;
pub mod version;

pub use config::{FeedConfig, Settings};
pub use feed::{process_feed, Fetcher, HttpFetcher, NormalizedFeedAggregation};
pub use matcher::scan_repository;
pub use model::{CompromisedListSnapshot, CompromisedMap, Finding, PackageEntry, Report};
