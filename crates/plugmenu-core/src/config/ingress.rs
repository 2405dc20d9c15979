//! Host event ingress configuration.

use serde::{Deserialize, Serialize};

use crate::events::PLUGIN_CONTEXT_MENU_EVENT;

/// Settings for the subscription to plugin menu events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngressConfig {
    /// Name of the host event carrying register/unregister actions.
    #[serde(default = "default_event_name")]
    pub event_name: String,
    /// Capacity of the event bus channel; slower subscribers skip events.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            event_name: default_event_name(),
            buffer_size: default_buffer_size(),
        }
    }
}

fn default_event_name() -> String {
    PLUGIN_CONTEXT_MENU_EVENT.to_string()
}

fn default_buffer_size() -> usize {
    256
}
