//! Custom validation functions for configuration.

use once_cell::sync::Lazy;
use regex::Regex;
use validator::ValidationError;

/// Component labels end up as `tracing` field values: lowercase, digits, `_` and `-`.
pub(crate) static COMPONENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[a-z0-9_-]+$").expect("component pattern compiles"));

/// Validate a `tracing` level name.
pub fn validate_level(level: &str) -> Result<(), ValidationError> {
    let valid = ["trace", "debug", "info", "warn", "error"]
        .contains(&level.to_lowercase().as_str());
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_level"))
    }
}
