//! Response envelope normalization
//!
//! Upstreams disagree on how they wrap record lists: the Exoplanet Archive
//! returns a bare array (or `{data: [...]}` through some proxies), the TLE
//! API uses `member`, TechPort uses `projects`. Everything is flattened to a
//! plain `Vec<Value>` right after the fetch so adapters only ever see one
//! shape.

use serde_json::Value;

use super::FetchError;

/// Object keys that may hold the record array, checked in order
const ENVELOPE_KEYS: [&str; 4] = ["data", "member", "projects", "results"];

/// Parses a response body into a list of raw records
pub fn parse_records(body: &str) -> Result<Vec<Value>, FetchError> {
    let value: Value = serde_json::from_str(body)?;
    extract_records(value)
}

/// Extracts the record list from a bare array or a known envelope object
pub fn extract_records(value: Value) -> Result<Vec<Value>, FetchError> {
    match value {
        Value::Array(records) => Ok(records),
        Value::Object(mut map) => {
            for key in ENVELOPE_KEYS {
                if let Some(Value::Array(records)) = map.remove(key) {
                    return Ok(records);
                }
            }
            let keys: Vec<&String> = map.keys().collect();
            Err(FetchError::Parse(format!(
                "expected a record array, got object with keys {:?}",
                keys
            )))
        }
        other => Err(FetchError::Parse(format!(
            "expected a record array, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
