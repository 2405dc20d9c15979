//! Typed result of one menu selection dispatch.

use std::fmt;

use serde::Serialize;

use plugmenu_core::types::RequestId;

/// How a `context_menu_callback` round trip ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The plugin acknowledged the callback.
    Delivered {
        /// Correlation id of the request.
        request_id: RequestId,
    },
    /// No reply arrived within the dispatch timeout.
    TimedOut {
        /// Correlation id of the request.
        request_id: RequestId,
        /// The timeout that elapsed, in milliseconds.
        timeout_ms: u64,
    },
    /// The plugin reported a failure, or the channel to it failed.
    PluginError {
        /// Correlation id of the request.
        request_id: RequestId,
        /// Failure description.
        message: String,
    },
}

impl DispatchOutcome {
    /// Correlation id of the dispatched request.
    pub fn request_id(&self) -> RequestId {
        match self {
            Self::Delivered { request_id }
            | Self::TimedOut { request_id, .. }
            | Self::PluginError { request_id, .. } => *request_id,
        }
    }

    /// Whether the plugin acknowledged the callback.
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delivered { .. } => write!(f, "delivered"),
            Self::TimedOut { timeout_ms, .. } => write!(f, "timed out after {timeout_ms}ms"),
            Self::PluginError { message, .. } => write!(f, "plugin error: {message}"),
        }
    }
}
