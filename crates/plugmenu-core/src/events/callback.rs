//! Arguments of the `context_menu_callback` command.

use serde::{Deserialize, Serialize};

/// Tells a plugin which of its items was selected, and on what.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackArgs {
    /// Plugin that owns the selected item.
    pub plugin_id: String,
    /// Context the menu was opened in.
    pub context: String,
    /// Identifier of the selected item.
    pub item_id: String,
    /// Opaque payload describing what the menu was opened on.
    pub target_data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_field_names() {
        let args = CallbackArgs {
            plugin_id: "backup".to_string(),
            context: "server-row".to_string(),
            item_id: "snapshot".to_string(),
            target_data: "srv-1".to_string(),
        };
        let json = serde_json::to_value(&args).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "pluginId": "backup",
                "context": "server-row",
                "itemId": "snapshot",
                "targetData": "srv-1",
            })
        );
    }
}
