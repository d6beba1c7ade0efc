//! Helpers shared by the HTTP-backed adapters.

use nickscan_core::SourceName;
use nickscan_scanner::{Payload, Result, ScanError};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::Url;
use serde_json::Value;
use std::time::Duration;

/// Seconds from a `Retry-After` header, if present and numeric.
#[must_use]
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    header_u64(headers, RETRY_AFTER.as_str()).map(Duration::from_secs)
}

/// Parse a header as an unsigned integer.
#[must_use]
pub fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

/// Append path segments to a base URL, percent-encoding each one.
pub fn join_segments(source_name: &SourceName, base_url: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| ScanError::transport(source_name, format!("invalid base URL: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| ScanError::transport(source_name, "base URL cannot carry a path"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Require a JSON object body.
pub fn into_payload(source_name: &SourceName, body: Value) -> Result<Payload> {
    match body {
        Value::Object(map) => Ok(map),
        other => Err(ScanError::invalid_response(
            source_name,
            format!("expected a JSON object, got {}", kind(&other)),
        )),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
