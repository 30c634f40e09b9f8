//! ## delayed-telemetry::logging
//! **`tracing` subscriber setup**
//!
//! Handles emit plain `tracing` events with a `component` field; this module only
//! decides where they go. `RUST_LOG` takes precedence over the configured level.

use delayed_config::TelemetryConfig;
use tracing_subscriber::{fmt, EnvFilter};

use crate::TelemetryError;

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global subscriber.
    ///
    /// # Panics
    /// If a global subscriber is already set or the configured level does not parse.
    pub fn init(config: &TelemetryConfig) {
        if let Err(err) = Self::try_init(config) {
            panic!("failed to initialise logging: {err}");
        }
    }

    /// Installs the global subscriber, reporting instead of panicking when one exists.
    pub fn try_init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
        let builder = fmt()
            .with_env_filter(Self::env_filter(config)?)
            .with_thread_names(config.thread_names);

        let installed = if config.json {
            builder.json().try_init()
        } else {
            builder.try_init()
        };
        installed.map_err(|err| TelemetryError::Init(err.to_string()))
    }

    fn env_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => Self::directive_filter(&config.level),
        }
    }

    /// Builds a filter from directives such as `info` or `warn,delayed_core=trace`.
    pub fn directive_filter(directives: &str) -> Result<EnvFilter, TelemetryError> {
        Ok(EnvFilter::try_new(directives)?)
    }
}
