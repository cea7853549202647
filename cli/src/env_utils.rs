use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};

/// Reads `key` and parses it, falling back to `default` when unset.
/// `expected` names the accepted shape in the error, e.g. "a valid port".
pub(crate) fn parse_env<T>(key: &str, default: T, expected: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be {expected}, got '{raw}'")),
        Err(_) => Ok(default),
    }
}

pub(crate) fn parse_bool_env(key: &str, default: bool) -> Result<bool> {
    let Ok(raw) = env::var(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("{key} must be a boolean, got '{raw}'"),
    }
}

/// Unset and blank values both mean "not configured".
pub(crate) fn optional_string_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
