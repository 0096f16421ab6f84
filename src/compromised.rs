//! Loading a pre-built compromised package list.
//!
//! A list is either a snapshot written by `npm-validator update`
//! (`{"packages": [{"name": ..., "versions": [...]}, ...]}`) or a plain
//! mapping (`{"left-pad": ["1.0.0"]}`). It can live on disk or behind an
//! `http(s)://` URL.

use serde_json::Value;
use std::fs;
use std::path::PathBuf;

use crate::feed::{FetchError, Fetcher};
use crate::model::CompromisedMap;

#[derive(Debug, thiserror::Error)]
pub enum ListError {
    #[error("failed to fetch compromised list: {0}")]
    Fetch(#[from] FetchError),

    #[error("failed to read compromised list {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("compromised list is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported compromised list format")]
    UnsupportedFormat,
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

fn version_strings(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Normalises a decoded list payload into `name -> versions`.
///
/// The snapshot form wins when its `packages` array yields at least one
/// named entry; otherwise every top-level value must be an array.
pub fn coerce_payload(data: &Value) -> Result<CompromisedMap, ListError> {
    let Value::Object(object) = data else {
        return Err(ListError::UnsupportedFormat);
    };

    if let Some(Value::Array(entries)) = object.get("packages") {
        let normalised: CompromisedMap = entries
            .iter()
            .filter_map(|entry| {
                let name = entry.get("name")?.as_str()?;
                let versions = entry.get("versions").map(version_strings).unwrap_or_default();
                Some((name.to_string(), versions))
            })
            .collect();
        if !normalised.is_empty() {
            return Ok(normalised);
        }
    }

    if object.values().all(Value::is_array) {
        return Ok(object
            .iter()
            .map(|(name, versions)| (name.clone(), version_strings(versions)))
            .collect());
    }

    Err(ListError::UnsupportedFormat)
}

/// Loads a compromised list from a file path or URL.
pub fn load(source: &str, fetcher: &dyn Fetcher) -> Result<CompromisedMap, ListError> {
    let bytes = if is_remote(source) {
        fetcher.fetch(source)?
    } else {
        let path = PathBuf::from(source);
        fs::read(&path).map_err(|source| ListError::Read { path, source })?
    };

    let data: Value = serde_json::from_slice(&bytes)?;
    let list = coerce_payload(&data)?;
    tracing::debug!(source, packages = list.len(), "loaded compromised list");
    Ok(list)
}
