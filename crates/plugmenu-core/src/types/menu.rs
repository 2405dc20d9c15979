//! Menu items and positions.

use serde::{Deserialize, Serialize};

/// A menu item as a plugin describes it, before ownership is attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItemSpec {
    /// Item identifier, unique within one plugin and context.
    pub id: String,
    /// Display label.
    pub label: String,
    /// Opaque icon reference for the renderer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl MenuItemSpec {
    /// Creates an item description without an icon.
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            icon: None,
        }
    }

    /// Sets the icon reference.
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

/// A registered menu item stamped with the plugin that owns it.
///
/// The owner is a plain identifier, resolved to a dispatch route only
/// when the item is selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    /// Item identifier, unique within one plugin and context.
    pub id: String,
    /// Display label.
    pub label: String,
    /// Opaque icon reference for the renderer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Identifier of the plugin that registered this item.
    pub plugin_id: String,
}

impl MenuItem {
    /// Attaches `plugin_id` ownership to an item description.
    pub fn owned_by(spec: MenuItemSpec, plugin_id: &str) -> Self {
        Self {
            id: spec.id,
            label: spec.label,
            icon: spec.icon,
            plugin_id: plugin_id.to_string(),
        }
    }
}

/// Screen position where a menu was requested.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MenuPosition {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl MenuPosition {
    /// Creates a position.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}
