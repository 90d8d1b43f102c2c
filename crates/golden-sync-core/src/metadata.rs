use crate::error::Result;
use crate::io;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

pub const TIMESTAMP_KEY: &str = "timestamp";

/// ISO-8601 UTC with second precision, e.g. `2024-05-01T12:00:00Z`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn timestamp_now() -> String {
    format_timestamp(Utc::now())
}

/// Set `timestamp` on the document; every other key is left as is.
pub fn stamp(mut document: Map<String, Value>, timestamp: &str) -> Map<String, Value> {
    document.insert(TIMESTAMP_KEY.to_string(), Value::String(timestamp.to_string()));
    document
}

/// Serialize the document to `<dir>/<file_name>`.
pub fn write(dir: &Path, file_name: &str, document: &Map<String, Value>) -> Result<PathBuf> {
    let path = dir.join(file_name);
    let mut body = serde_json::to_string_pretty(document)?;
    body.push('\n');
    io::atomic_write(&path, body.as_bytes())?;
    Ok(path)
}
