//! Observability configuration.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

/// Telemetry configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct TelemetryConfig {
    /// Default `tracing` level, overridden by `RUST_LOG` when set.
    #[serde(default = "default_level")]
    #[validate(custom(function = validation::validate_level))]
    pub level: String,

    /// Emit JSON lines instead of the human readable format.
    #[serde(default)]
    pub json: bool,

    /// Include thread names in every event.
    #[serde(default = "default_true")]
    pub thread_names: bool,
}

fn default_level() -> String {
    "info".into()
}

fn default_true() -> bool {
    true
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
            thread_names: default_true(),
        }
    }
}
