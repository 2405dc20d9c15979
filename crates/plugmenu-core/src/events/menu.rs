//! `plugin-context-menu` event payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::types::MenuItemSpec;

/// Action requested by a menu event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuAction {
    /// Replace the plugin's items for a context.
    Register,
    /// Remove the plugin's items for a context.
    Unregister,
}

impl MenuAction {
    /// Returns the wire name of this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Unregister => "unregister",
        }
    }
}

impl std::fmt::Display for MenuAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons an inbound menu event is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedEvent {
    /// The payload is not a JSON object.
    #[error("payload is not an object")]
    NotAnObject,
    /// A required field is absent, null, or blank.
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    /// The action is neither `register` nor `unregister`.
    #[error("unknown action `{0}`")]
    UnknownAction(String),
    /// A field has the wrong type.
    #[error("invalid payload: {0}")]
    InvalidShape(String),
}

/// A validated menu registration event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuEvent {
    /// Requested action.
    pub action: MenuAction,
    /// Plugin issuing the event.
    pub plugin_id: String,
    /// Context the items belong to.
    pub context: String,
    /// Items to register; ignored for `unregister`.
    pub items: Vec<MenuItemSpec>,
}

#[derive(Debug, Deserialize)]
struct RawMenuEvent {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    plugin_id: Option<String>,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    items: Option<Vec<MenuItemSpec>>,
}

impl MenuEvent {
    /// Builds a `register` event.
    pub fn register(
        plugin_id: impl Into<String>,
        context: impl Into<String>,
        items: Vec<MenuItemSpec>,
    ) -> Self {
        Self {
            action: MenuAction::Register,
            plugin_id: plugin_id.into(),
            context: context.into(),
            items,
        }
    }

    /// Builds an `unregister` event.
    pub fn unregister(plugin_id: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            action: MenuAction::Unregister,
            plugin_id: plugin_id.into(),
            context: context.into(),
            items: Vec::new(),
        }
    }

    /// Validates an untyped event payload.
    pub fn from_value(value: Value) -> Result<Self, MalformedEvent> {
        if !value.is_object() {
            return Err(MalformedEvent::NotAnObject);
        }

        let raw: RawMenuEvent = serde_json::from_value(value)
            .map_err(|e| MalformedEvent::InvalidShape(e.to_string()))?;

        let plugin_id = required(raw.plugin_id, "plugin_id")?;
        let context = required(raw.context, "context")?;
        let action = match raw.action.as_deref().map(str::trim) {
            Some("register") => MenuAction::Register,
            Some("unregister") => MenuAction::Unregister,
            Some(other) => return Err(MalformedEvent::UnknownAction(other.to_string())),
            None => return Err(MalformedEvent::MissingField("action")),
        };

        Ok(Self {
            action,
            plugin_id,
            context,
            items: raw.items.unwrap_or_default(),
        })
    }

    /// Serializes the event into its wire payload.
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "action": self.action.as_str(),
            "plugin_id": self.plugin_id,
            "context": self.context,
            "items": self.items,
        })
    }

    /// The action to apply: a `register` without items unregisters.
    pub fn effective_action(&self) -> MenuAction {
        match self.action {
            MenuAction::Register if self.items.is_empty() => MenuAction::Unregister,
            action => action,
        }
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, MalformedEvent> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(MalformedEvent::MissingField(field)),
    }
}
