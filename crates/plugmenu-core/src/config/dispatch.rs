//! Plugin callback dispatch configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::events::CONTEXT_MENU_CALLBACK;

/// Settings for delivering menu selections to plugins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// How long a selection waits for the plugin before timing out.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Command name sent across the process boundary.
    #[serde(default = "default_command_name")]
    pub command_name: String,
}

impl DispatchConfig {
    /// Returns the dispatch timeout, never shorter than one millisecond.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            command_name: default_command_name(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_command_name() -> String {
    CONTEXT_MENU_CALLBACK.to_string()
}
