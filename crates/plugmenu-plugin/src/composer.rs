//! Menu composer: merges a context's items with the global fallback.

use plugmenu_core::types::MenuItem;

use crate::registry::{GLOBAL_CONTEXT, MenuRegistry};

/// Read-only view that builds display lists from a [`MenuRegistry`].
#[derive(Debug, Clone, Copy)]
pub struct MenuComposer<'a> {
    registry: &'a MenuRegistry,
}

impl<'a> MenuComposer<'a> {
    /// Creates a composer over `registry`.
    pub fn new(registry: &'a MenuRegistry) -> Self {
        Self { registry }
    }

    /// Composes the ordered item list for `context`.
    ///
    /// Context items come first (plugin registration order, then each
    /// plugin's insertion order), followed by global items under the same
    /// rule unless `context` is itself global. An empty list means there
    /// is nothing to show.
    pub fn compose(&self, context: &str) -> Vec<MenuItem> {
        let mut items: Vec<MenuItem> = self
            .registry
            .bucket(context)
            .map(|bucket| bucket.items().cloned().collect())
            .unwrap_or_default();

        if context != GLOBAL_CONTEXT {
            if let Some(global) = self.registry.bucket(GLOBAL_CONTEXT) {
                items.extend(global.items().cloned());
            }
        }

        items
    }
}
