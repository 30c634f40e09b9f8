//! # Delayed Configuration System
//!
//! Layered configuration for delayed-call handles and their telemetry.
//!
//! ## Features
//! - **Unified Configuration**: one container for timer, virtual-time and telemetry settings
//! - **Validation**: ranges and formats checked with `validator` after every load
//! - **Environment Awareness**: `DELAYED_ENV` selects an override file, `DELAYED_*` vars win last

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod error;
mod telemetry;
mod timer;
mod validation;
mod virtual_time;

pub use error::ConfigError;
pub use telemetry::TelemetryConfig;
pub use timer::TimerConfig;
pub use virtual_time::VirtualTimeConfig;

/// Top‑level configuration container.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone)]
pub struct DelayedConfig {
    /// Real-time handle defaults.
    #[validate(nested)]
    #[serde(default)]
    pub timer: TimerConfig,

    /// Virtual clock and virtual-time handle settings.
    #[validate(nested)]
    #[serde(default)]
    pub virtual_time: VirtualTimeConfig,

    /// Logging parameters.
    #[validate(nested)]
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl DelayedConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default Values
    /// 2. `config/delayed.yaml` - base settings. If missing, defaults are used.
    /// 3. `config/<environment>.yaml` - environment‑specific overrides.
    /// 4. `DELAYED_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(DelayedConfig::default()));

        if Path::new("config/delayed.yaml").exists() {
            figment = figment.merge(Yaml::file("config/delayed.yaml"));
        }

        let env = std::env::var("DELAYED_ENV").unwrap_or_else(|_| "production".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::extract(figment.merge(Env::prefixed("DELAYED_").split("__")))
    }

    /// Load configuration from a specific path, on top of the defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        Self::extract(
            Figment::from(Serialized::defaults(DelayedConfig::default()))
                .merge(Yaml::file(path))
                .merge(Env::prefixed("DELAYED_").split("__")),
        )
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn jailed(err: ConfigError) -> figment::Error {
        figment::Error::from(err.to_string())
    }

    #[test]
    fn full_config_validation() {
        let config = DelayedConfig::default();
        config.validate().expect("Default config should validate");
    }

    #[test]
    fn defaults_without_files() {
        Jail::expect_with(|_jail| {
            let config = DelayedConfig::load().map_err(jailed)?;
            assert_eq!(config.timer.delay_ms, 1000);
            assert_eq!(config.timer.component, "delayed");
            assert_eq!(config.virtual_time.settle_ms, 10);
            assert_eq!(config.telemetry.level, "info");
            Ok(())
        });
    }

    #[test]
    fn file_then_environment_override() {
        Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file(
                "config/delayed.yaml",
                "timer:\n  delay_ms: 300\n  component: idler\n",
            )?;
            jail.set_env("DELAYED_TIMER__DELAY_MS", "250");

            let config = DelayedConfig::load().map_err(jailed)?;
            assert_eq!(config.timer.delay_ms, 250);
            assert_eq!(config.timer.component, "idler");
            Ok(())
        });
    }

    #[test]
    fn environment_file_selected_by_env_var() {
        Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file("config/testing.yaml", "virtual_time:\n  settle_ms: 0\n")?;
            jail.set_env("DELAYED_ENV", "testing");

            let config = DelayedConfig::load().map_err(jailed)?;
            assert_eq!(config.virtual_time.settle_ms, 0);
            Ok(())
        });
    }

    #[test]
    fn negative_delay_is_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("DELAYED_TIMER__DELAY_MS", "-5");
            let err = DelayedConfig::load().expect_err("negative delay must not validate");
            assert!(matches!(err, ConfigError::Validation(_)));
            assert!(err.to_string().contains("delay_ms"));
            Ok(())
        });
    }

    #[test]
    fn missing_file_is_reported() {
        let err = DelayedConfig::load_from_path("does/not/exist.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn malformed_file_is_a_parsing_error() {
        Jail::expect_with(|jail| {
            jail.create_file("broken.yaml", "timer:\n  delay_ms: soon\n")?;
            let err = DelayedConfig::load_from_path("broken.yaml").unwrap_err();
            assert!(matches!(err, ConfigError::Parsing(_)));
            assert!(err.to_string().starts_with("Configuration parsing error"));
            Ok(())
        });
    }

    #[test]
    fn load_from_path_keeps_defaults_for_missing_sections() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.yaml", "telemetry:\n  level: debug\n  json: true\n")?;
            let config = DelayedConfig::load_from_path("custom.yaml").map_err(jailed)?;
            assert_eq!(config.telemetry.level, "debug");
            assert!(config.telemetry.json);
            assert_eq!(config.timer.delay_ms, 1000);
            Ok(())
        });
    }
}
