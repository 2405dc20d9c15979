//! Event ingress: turns `plugin-context-menu` events into registry edits.

use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use plugmenu_core::events::{MenuAction, MenuEvent};

use crate::bus::HostEventBus;
use crate::registry::MenuRegistry;

/// What happened to one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngressOutcome {
    /// Items were stored for the plugin and context.
    Registered {
        /// Number of items stored.
        items: usize,
    },
    /// The plugin's items were removed from the context (or were absent).
    Unregistered,
    /// The event was malformed and ignored.
    Dropped,
}

/// Counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngressStats {
    /// Events applied to the registry.
    pub applied: u64,
    /// Malformed events dropped.
    pub dropped: u64,
    /// Events skipped because the subscriber lagged behind.
    pub lagged: u64,
}

/// Subscription to plugin menu events.
#[derive(Debug)]
pub struct EventIngress {
    event_name: String,
    receiver: Option<broadcast::Receiver<Value>>,
    stats: IngressStats,
}

impl EventIngress {
    /// Creates an unsubscribed ingress for events named `event_name`.
    pub fn new(event_name: impl Into<String>) -> Self {
        Self {
            event_name: event_name.into(),
            receiver: None,
            stats: IngressStats::default(),
        }
    }

    /// Subscribes to the bus. Returns `false` if already subscribed.
    pub async fn subscribe(&mut self, bus: &HostEventBus) -> bool {
        if self.receiver.is_some() {
            return false;
        }
        self.receiver = Some(bus.subscribe(&self.event_name).await);
        info!(event = %self.event_name, "Menu event listener initialized");
        true
    }

    /// Drops the subscription. Returns `false` if not subscribed.
    pub fn teardown(&mut self) -> bool {
        let was_subscribed = self.receiver.take().is_some();
        if was_subscribed {
            info!(event = %self.event_name, "Menu event listener removed");
        }
        was_subscribed
    }

    /// Whether a subscription is active.
    pub fn is_subscribed(&self) -> bool {
        self.receiver.is_some()
    }

    /// Returns diagnostics counters.
    pub fn stats(&self) -> IngressStats {
        self.stats
    }

    /// Waits for the next event payload.
    ///
    /// Returns `None` without waiting when unsubscribed, and tears the
    /// subscription down when the bus closes.
    pub async fn recv(&mut self) -> Option<Value> {
        loop {
            let receiver = self.receiver.as_mut()?;
            match receiver.recv().await {
                Ok(payload) => return Some(payload),
                Err(RecvError::Lagged(skipped)) => {
                    self.stats.lagged += skipped;
                    warn!(
                        event = %self.event_name,
                        skipped = skipped,
                        "Menu event listener lagged, events skipped"
                    );
                }
                Err(RecvError::Closed) => {
                    warn!(event = %self.event_name, "Menu event stream closed");
                    self.receiver = None;
                    return None;
                }
            }
        }
    }

    /// Validates `payload` and applies it to `registry`.
    ///
    /// Malformed payloads are logged and dropped.
    pub fn apply(&mut self, registry: &mut MenuRegistry, payload: Value) -> IngressOutcome {
        let event = match MenuEvent::from_value(payload) {
            Ok(event) => event,
            Err(reason) => {
                self.stats.dropped += 1;
                warn!(event = %self.event_name, reason = %reason, "Malformed menu event dropped");
                return IngressOutcome::Dropped;
            }
        };

        self.stats.applied += 1;
        debug!(
            plugin_id = %event.plugin_id,
            context = %event.context,
            action = %event.action,
            items = event.items.len(),
            "Menu event received"
        );

        match event.effective_action() {
            MenuAction::Register => {
                let items = registry.register(&event.plugin_id, &event.context, event.items);
                IngressOutcome::Registered { items }
            }
            MenuAction::Unregister => {
                registry.unregister(&event.plugin_id, &event.context);
                IngressOutcome::Unregistered
            }
        }
    }
}
