//! Manifest fetch and parse

use crate::error::LoadError;
use crate::source::MediaSource;
use crate::utils::format_bytes;
use serde_json::Value;
use tracing::debug;

/// Fetch the manifest with cache bypass and parse it into raw entries.
pub async fn fetch_manifest(source: &dyn MediaSource, path: &str) -> Result<Vec<Value>, LoadError> {
    let body = source
        .fetch(path, true)
        .await
        .map_err(LoadError::ManifestUnavailable)?;
    debug!(path, size = %format_bytes(body.len() as u64), "Manifest fetched");
    parse_manifest(&body)
}

/// Entries are returned as-is; filtering happens in classification.
pub fn parse_manifest(body: &[u8]) -> Result<Vec<Value>, LoadError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Array(entries)) => Ok(entries),
        Ok(other) => Err(LoadError::malformed(format!(
            "expected a JSON array, found {}",
            json_type_name(&other)
        ))),
        Err(e) => Err(LoadError::malformed(e.to_string())),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
