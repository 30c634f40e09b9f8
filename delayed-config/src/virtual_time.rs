//! Virtual clock parameters.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct VirtualTimeConfig {
    /// Starting offset of the virtual clock, in nanoseconds.
    #[serde(default)]
    pub seed_ns: u64,

    /// Pause after arming a waiter so it is parked before the caller continues.
    #[serde(default = "default_settle_ms")]
    #[validate(range(max = 1000))]
    pub settle_ms: u64,
}

fn default_settle_ms() -> u64 {
    10
}

impl Default for VirtualTimeConfig {
    fn default() -> Self {
        Self {
            seed_ns: 0,
            settle_ms: default_settle_ms(),
        }
    }
}

impl VirtualTimeConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}
