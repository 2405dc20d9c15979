//! Wire shapes exchanged with plugins.
//!
//! Inbound: `plugin-context-menu` events carrying register/unregister
//! actions. Outbound: the `context_menu_callback` command issued when a
//! user selects a plugin's menu item.

pub mod callback;
pub mod menu;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use callback::CallbackArgs;
pub use menu::{MalformedEvent, MenuAction, MenuEvent};

/// Host event name carrying plugin menu registrations.
pub const PLUGIN_CONTEXT_MENU_EVENT: &str = "plugin-context-menu";

/// Command name used to notify a plugin of a menu selection.
pub const CONTEXT_MENU_CALLBACK: &str = "context_menu_callback";

/// A named event delivered by the host event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostEvent {
    /// Event name, e.g. [`PLUGIN_CONTEXT_MENU_EVENT`].
    pub name: String,
    /// Untyped payload; consumers validate it.
    pub payload: Value,
}

impl HostEvent {
    /// Creates a host event.
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}
