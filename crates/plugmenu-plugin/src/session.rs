//! The single visible menu session.

use serde::{Deserialize, Serialize};
use tracing::debug;

use plugmenu_core::events::CallbackArgs;
use plugmenu_core::types::{MenuItem, MenuPosition};

use crate::composer::MenuComposer;
use crate::registry::MenuRegistry;

/// Serializable snapshot of the session for the renderer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuState {
    /// Whether a menu is showing.
    pub visible: bool,
    /// Horizontal position of the menu.
    pub x: f64,
    /// Vertical position of the menu.
    pub y: f64,
    /// Context the menu was opened in.
    pub context: String,
    /// Opaque payload the menu was opened on.
    pub target_data: String,
    /// Items shown, in display order.
    pub items: Vec<MenuItem>,
}

/// Holds at most one open menu.
///
/// While closed, the context, payload, and items are empty.
#[derive(Debug, Default)]
pub struct MenuSession {
    visible: bool,
    position: MenuPosition,
    context: String,
    target_payload: String,
    composed_items: Vec<MenuItem>,
    /// Incremented on every successful open; identifies the current menu.
    generation: u64,
}

impl MenuSession {
    /// Creates a closed session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a menu for `context` at `position` over `data`.
    ///
    /// Returns the new session id, or `None` when the composed list is
    /// empty. In that case nothing changes and a previous menu stays as
    /// it was. A previous menu is otherwise replaced without notice.
    pub fn open(
        &mut self,
        registry: &MenuRegistry,
        context: &str,
        position: MenuPosition,
        data: &str,
    ) -> Option<u64> {
        let items = MenuComposer::new(registry).compose(context);
        if items.is_empty() {
            debug!(context = %context, "No menu items for context");
            return None;
        }

        self.generation += 1;
        self.visible = true;
        self.position = position;
        self.context = context.to_string();
        self.target_payload = data.to_string();
        self.composed_items = items;

        debug!(
            context = %context,
            session = self.generation,
            items = self.composed_items.len(),
            "Menu opened"
        );
        Some(self.generation)
    }

    /// Hides the menu and clears all session fields.
    pub fn close(&mut self) {
        self.visible = false;
        self.position = MenuPosition::default();
        self.context.clear();
        self.target_payload.clear();
        self.composed_items.clear();
    }

    /// Builds the callback arguments for selecting `item` in this menu.
    ///
    /// Returns `None` while no menu is visible.
    pub fn callback_for(&self, item: &MenuItem) -> Option<CallbackArgs> {
        if !self.visible {
            return None;
        }
        Some(CallbackArgs {
            plugin_id: item.plugin_id.clone(),
            context: self.context.clone(),
            item_id: item.id.clone(),
            target_data: self.target_payload.clone(),
        })
    }

    /// Finds a shown item by id.
    pub fn find_item(&self, item_id: &str) -> Option<&MenuItem> {
        self.composed_items.iter().find(|i| i.id == item_id)
    }

    /// Whether a menu is showing.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Id of the current (or last) menu.
    pub fn id(&self) -> u64 {
        self.generation
    }

    /// Context of the visible menu; empty while closed.
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Payload of the visible menu; empty while closed.
    pub fn target_payload(&self) -> &str {
        &self.target_payload
    }

    /// Items of the visible menu; empty while closed.
    pub fn items(&self) -> &[MenuItem] {
        &self.composed_items
    }

    /// Returns a snapshot for rendering.
    pub fn state(&self) -> MenuState {
        MenuState {
            visible: self.visible,
            x: self.position.x,
            y: self.position.y,
            context: self.context.clone(),
            target_data: self.target_payload.clone(),
            items: self.composed_items.clone(),
        }
    }
}
