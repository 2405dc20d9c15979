//! Menu registry: plugins register items by context, keyed by plugin id.
//!
//! The registry is a plain owned table with no interior locking. It is
//! mutated only by the task that owns it (see [`crate::manager`]).

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use plugmenu_core::types::{MenuItem, MenuItemSpec};

/// Reserved context whose items are appended to every other context.
pub const GLOBAL_CONTEXT: &str = "global";

/// One plugin's contribution to a context.
#[derive(Debug, Clone)]
struct PluginEntry {
    /// Plugin that registered these items.
    plugin_id: String,
    /// Items in registration order; never empty.
    items: Vec<MenuItem>,
}

/// All plugin contributions for one context, in plugin registration order.
#[derive(Debug, Clone, Default)]
pub struct ContextBucket {
    entries: Vec<PluginEntry>,
}

impl ContextBucket {
    /// Returns the items contributed by `plugin_id`, if any.
    pub fn plugin_items(&self, plugin_id: &str) -> Option<&[MenuItem]> {
        self.entries
            .iter()
            .find(|e| e.plugin_id == plugin_id)
            .map(|e| e.items.as_slice())
    }

    /// Iterates plugin ids in registration order.
    pub fn plugin_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.plugin_id.as_str())
    }

    /// Iterates all items, plugin by plugin, each in insertion order.
    pub fn items(&self) -> impl Iterator<Item = &MenuItem> {
        self.entries.iter().flat_map(|e| e.items.iter())
    }

    /// Whether no plugin contributes to this context.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replaces (or appends) the items of one plugin.
    fn upsert(&mut self, plugin_id: &str, items: Vec<MenuItem>) {
        match self.entries.iter_mut().find(|e| e.plugin_id == plugin_id) {
            Some(entry) => entry.items = items,
            None => self.entries.push(PluginEntry {
                plugin_id: plugin_id.to_string(),
                items,
            }),
        }
    }

    /// Removes one plugin's entry. Returns whether it was present.
    fn remove(&mut self, plugin_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.plugin_id != plugin_id);
        self.entries.len() != before
    }
}

/// Registry of plugin menu items organized by context.
#[derive(Debug, Default)]
pub struct MenuRegistry {
    /// Context name → plugin contributions. Never holds an empty bucket.
    contexts: HashMap<String, ContextBucket>,
}

impl MenuRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all items `plugin_id` contributes to `context`.
    ///
    /// Items are stamped with `plugin_id`. An empty `items` list behaves
    /// like [`MenuRegistry::unregister`]. Duplicate item ids keep the
    /// first occurrence. Returns the number of items stored.
    pub fn register(&mut self, plugin_id: &str, context: &str, items: Vec<MenuItemSpec>) -> usize {
        let mut seen = HashSet::new();
        let items: Vec<MenuItem> = items
            .into_iter()
            .filter(|spec| {
                let fresh = seen.insert(spec.id.clone());
                if !fresh {
                    warn!(
                        plugin_id = %plugin_id,
                        context = %context,
                        item_id = %spec.id,
                        "Duplicate menu item id dropped"
                    );
                }
                fresh
            })
            .map(|spec| MenuItem::owned_by(spec, plugin_id))
            .collect();

        if items.is_empty() {
            self.unregister(plugin_id, context);
            return 0;
        }

        let count = items.len();
        self.contexts
            .entry(context.to_string())
            .or_default()
            .upsert(plugin_id, items);

        info!(
            plugin_id = %plugin_id,
            context = %context,
            items = count,
            "Menu items registered"
        );
        count
    }

    /// Removes `plugin_id`'s items from `context`, pruning the context if
    /// it becomes empty. Returns whether anything was removed.
    pub fn unregister(&mut self, plugin_id: &str, context: &str) -> bool {
        let Some(bucket) = self.contexts.get_mut(context) else {
            return false;
        };

        let removed = bucket.remove(plugin_id);
        if bucket.is_empty() {
            self.contexts.remove(context);
        }

        if removed {
            info!(plugin_id = %plugin_id, context = %context, "Menu items unregistered");
        }
        removed
    }

    /// Removes `plugin_id` from every context, pruning emptied contexts.
    ///
    /// Returns the contexts the plugin was removed from, sorted.
    pub fn remove_plugin(&mut self, plugin_id: &str) -> Vec<String> {
        let mut touched: Vec<String> = self
            .contexts
            .iter_mut()
            .filter_map(|(context, bucket)| bucket.remove(plugin_id).then(|| context.clone()))
            .collect();

        // Remove empty contexts
        self.contexts.retain(|_, bucket| !bucket.is_empty());

        touched.sort();
        for context in &touched {
            debug!(plugin_id = %plugin_id, context = %context, "Plugin menu entries purged");
        }
        touched
    }

    /// Returns the bucket for `context`, if any plugin contributes to it.
    pub fn bucket(&self, context: &str) -> Option<&ContextBucket> {
        self.contexts.get(context)
    }

    /// Whether `context` has its own contributions (global ones excluded).
    pub fn has_menu_items(&self, context: &str) -> bool {
        self.contexts
            .get(context)
            .map(|bucket| !bucket.is_empty())
            .unwrap_or(false)
    }

    /// Returns all contexts with contributions, sorted.
    pub fn contexts(&self) -> Vec<String> {
        let mut contexts: Vec<String> = self.contexts.keys().cloned().collect();
        contexts.sort();
        contexts
    }

    /// Returns the number of contexts with contributions.
    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    /// Whether no context has contributions.
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}
