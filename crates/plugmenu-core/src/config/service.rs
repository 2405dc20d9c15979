//! Menu service configuration.

use serde::{Deserialize, Serialize};

/// Settings for the menu service task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Capacity of the command queue between handles and the service.
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            queue_size: default_queue_size(),
        }
    }
}

fn default_queue_size() -> usize {
    64
}
