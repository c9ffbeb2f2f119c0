pub mod coordination;
pub mod memory;
pub mod tasks;

use serde_json::Value;

use aibridge_core::{Error, Result};

/// Pull a required, non-empty string parameter.
pub(crate) fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| Error::Validation(format!("'{key}' is required")))
}
