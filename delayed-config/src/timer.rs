//! Real-time handle defaults.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation::COMPONENT_RE;

/// Defaults applied to handles built with `DelayedFn::from_config`.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct TimerConfig {
    /// Delay before the callback fires, in milliseconds.
    #[serde(default = "default_delay_ms")]
    #[validate(range(min = 0))]
    pub delay_ms: i64,

    /// Label attached to every log event emitted by the handle.
    #[serde(default = "default_component")]
    #[validate(length(min = 1, max = 32), regex(path = *COMPONENT_RE))]
    pub component: String,
}

fn default_delay_ms() -> i64 {
    1000
}

fn default_component() -> String {
    "delayed".into()
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            component: default_component(),
        }
    }
}

impl TimerConfig {
    /// Configured delay as a signed duration. Values beyond the `TimeDelta`
    /// range clamp to `TimeDelta::MIN`, which scheduling rejects as negative.
    pub fn delay(&self) -> TimeDelta {
        TimeDelta::try_milliseconds(self.delay_ms).unwrap_or(TimeDelta::MIN)
    }
}
