//! Feed configuration handling.
//!
//! This module loads the list of threat-intelligence feeds to process from
//! a JSON settings file and validates it.
//!
//! # Configuration Location
//!
//! The settings file is resolved in this order:
//! - an explicit path supplied by the caller
//! - `settings.json` in the current directory
//! - the user config directory:
//!   - Linux: `~/.config/npm-validator/settings.json`
//!   - macOS: `~/Library/Application Support/npm-validator/settings.json`
//!   - Windows: `%APPDATA%\npm-validator\settings.json`
//!
//! # Example Configuration
//!
//! ```json
//! {
//!   "feeds": [
//!     { "id": "safedep", "url": "https://example.test/malicious.jsonl" },
//!     { "id": "wiz-mirror", "handler": "wiz", "url": "https://mirror.test/iocs.csv",
//!       "enabled": false, "description": "internal mirror" }
//!   ]
//! }
//! ```

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::feed::FeedHandler;

/// Filename looked up in the current directory and the user config directory.
pub const DEFAULT_CONFIG_FILE: &str = "settings.json";

/// The feed configuration is missing, malformed, or ambiguous.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read configuration file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in configuration file: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Configuration must be a JSON object")]
    NotAnObject,

    #[error("Configuration is missing required 'feeds' array")]
    MissingFeeds,

    #[error("'feeds' must be an array")]
    FeedsNotArray,

    #[error("'feeds' array must contain at least one entry")]
    EmptyFeeds,

    #[error("Feed at index {0} must be an object")]
    EntryNotObject(usize),

    #[error("Feed at index {0} is missing required 'id' field")]
    MissingId(usize),

    #[error("Feed '{0}' is missing required 'url' field")]
    MissingUrl(String),

    #[error("Feed '{id}' has invalid '{field}' field (must be {expected})")]
    InvalidField {
        id: String,
        field: &'static str,
        expected: &'static str,
    },

    #[error("Duplicate feed ID: '{0}'")]
    DuplicateId(String),

    #[error("Unknown feed handler(s): {}. Registered handlers: {}", .unknown.join(", "), .known.join(", "))]
    UnknownHandlers {
        unknown: Vec<String>,
        known: Vec<String>,
    },
}

/// Configuration for a single feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedConfig {
    pub id: String,
    pub url: String,
    pub enabled: bool,
    pub description: String,
    /// Registry handler id; defaults to `id`.
    pub handler: String,
}

fn non_empty_string(entry: &Map<String, Value>, key: &str) -> Option<String> {
    match entry.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

impl FeedConfig {
    fn from_value(value: &Value, index: usize) -> Result<Self, ConfigError> {
        let entry = value.as_object().ok_or(ConfigError::EntryNotObject(index))?;

        let id = non_empty_string(entry, "id").ok_or(ConfigError::MissingId(index))?;
        let url = non_empty_string(entry, "url").ok_or_else(|| ConfigError::MissingUrl(id.clone()))?;

        let invalid = |field, expected| ConfigError::InvalidField {
            id: id.clone(),
            field,
            expected,
        };

        let enabled = match entry.get("enabled") {
            None => true,
            Some(Value::Bool(b)) => *b,
            Some(_) => return Err(invalid("enabled", "boolean")),
        };

        let description = match entry.get("description") {
            None => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(_) => return Err(invalid("description", "string")),
        };

        let handler = match entry.get("handler") {
            None => id.clone(),
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(_) => return Err(invalid("handler", "non-empty string")),
        };

        Ok(Self {
            id,
            url,
            enabled,
            description,
            handler,
        })
    }
}

/// Ordered list of configured feeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub feeds: Vec<FeedConfig>,
}

impl Settings {
    /// Parses and validates a settings document.
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let data: Value = serde_json::from_str(content)?;
        let data = data.as_object().ok_or(ConfigError::NotAnObject)?;

        let feeds_data = match data.get("feeds") {
            None | Some(Value::Null) => return Err(ConfigError::MissingFeeds),
            Some(Value::Array(feeds)) => feeds,
            Some(_) => return Err(ConfigError::FeedsNotArray),
        };
        if feeds_data.is_empty() {
            return Err(ConfigError::EmptyFeeds);
        }

        let mut feeds = Vec::with_capacity(feeds_data.len());
        let mut seen_ids = HashSet::new();
        for (index, value) in feeds_data.iter().enumerate() {
            let feed = FeedConfig::from_value(value, index)?;
            if !seen_ids.insert(feed.id.clone()) {
                return Err(ConfigError::DuplicateId(feed.id));
            }
            feeds.push(feed);
        }

        Ok(Self { feeds })
    }

    /// One enabled feed per registered handler, pointing at its default URL.
    pub fn builtin() -> Self {
        let feeds = FeedHandler::ALL
            .iter()
            .map(|handler| FeedConfig {
                id: handler.id().to_string(),
                url: handler.default_url().to_string(),
                enabled: true,
                description: handler.display_name().to_string(),
                handler: handler.id().to_string(),
            })
            .collect();
        Self { feeds }
    }

    pub fn enabled_feeds(&self) -> impl Iterator<Item = &FeedConfig> {
        self.feeds.iter().filter(|f| f.enabled)
    }

    pub fn feed_by_id(&self, feed_id: &str) -> Option<&FeedConfig> {
        self.feeds.iter().find(|f| f.id == feed_id)
    }

    /// Pretty JSON for the built-in settings, for `config --init`.
    pub fn generate_default_config() -> String {
        serde_json::to_string_pretty(&Self::builtin()).unwrap_or_default()
    }
}

/// Loads and validates settings from a JSON file.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file is missing, unreadable, or invalid.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let settings = Settings::from_json_str(&content)?;
    tracing::debug!(path = %path.display(), feeds = settings.feeds.len(), "loaded feed settings");
    Ok(settings)
}

/// Checks that every enabled feed names a registered handler.
pub fn validate_feed_ids(settings: &Settings) -> Result<(), ConfigError> {
    let known = FeedHandler::known_ids();

    let mut unknown: Vec<String> = settings
        .enabled_feeds()
        .filter(|f| !known.iter().any(|k| *k == f.handler))
        .map(|f| f.handler.clone())
        .collect();

    if unknown.is_empty() {
        return Ok(());
    }

    unknown.sort();
    unknown.dedup();
    Err(ConfigError::UnknownHandlers {
        unknown,
        known: known.into_iter().map(String::from).collect(),
    })
}

/// Returns the path of the user-level settings file.
pub fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("npm-validator")
        .join(DEFAULT_CONFIG_FILE)
}

/// Resolves which settings file to use.
///
/// Returns `None` when no explicit path is given and neither default
/// location exists.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }

    let user = user_config_path();
    user.exists().then_some(user)
}
