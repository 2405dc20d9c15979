//! Plugin unload cleanup.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::dispatch::DispatchBridge;
use crate::registry::MenuRegistry;

/// What one cleanup removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Plugin that was cleaned up.
    pub plugin_id: String,
    /// Contexts the plugin had items in, sorted.
    pub contexts: Vec<String>,
    /// Whether a dispatch route was dropped.
    pub route_removed: bool,
}

/// Purges an unloaded plugin from the registry and the dispatch routes.
///
/// The host calls [`PluginLifecycleHook::cleanup`] once per unload or
/// crash. Calling it again for the same plugin is harmless.
#[derive(Debug, Clone)]
pub struct PluginLifecycleHook {
    bridge: Arc<DispatchBridge>,
}

impl PluginLifecycleHook {
    /// Creates a hook that also drops routes from `bridge`.
    pub fn new(bridge: Arc<DispatchBridge>) -> Self {
        Self { bridge }
    }

    /// Removes every registry entry owned by `plugin_id` and its route.
    ///
    /// Other plugins' entries in the same contexts are untouched.
    pub async fn cleanup(&self, registry: &mut MenuRegistry, plugin_id: &str) -> CleanupReport {
        let contexts = registry.remove_plugin(plugin_id);
        let route_removed = self.bridge.remove_route(plugin_id).await;

        info!(
            plugin_id = %plugin_id,
            contexts = contexts.len(),
            route_removed = route_removed,
            "Plugin menu cleanup complete"
        );

        CleanupReport {
            plugin_id: plugin_id.to_string(),
            contexts,
            route_removed,
        }
    }
}
