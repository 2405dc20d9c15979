//! In-memory host event bus.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::RwLock;
use tokio::sync::broadcast;
use tracing::trace;

use plugmenu_core::events::HostEvent;

/// Named broadcast channels carrying host event payloads.
#[derive(Debug)]
pub struct HostEventBus {
    /// Event name → broadcast sender
    channels: RwLock<HashMap<String, broadcast::Sender<Value>>>,
    /// Buffer size for channels
    buffer_size: usize,
}

impl HostEventBus {
    /// Create a new bus whose channels buffer `buffer_size` events.
    pub fn new(buffer_size: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            buffer_size: buffer_size.max(1),
        }
    }

    /// Publish a payload under `name`. Returns how many subscribers got it.
    pub async fn publish(&self, name: &str, payload: Value) -> usize {
        let channels = self.channels.read().await;
        let delivered = channels
            .get(name)
            .and_then(|tx| tx.send(payload).ok())
            .unwrap_or(0);
        trace!(event = %name, subscribers = delivered, "Host event published");
        delivered
    }

    /// Publish a [`HostEvent`].
    pub async fn emit(&self, event: HostEvent) -> usize {
        self.publish(&event.name, event.payload).await
    }

    /// Subscribe to events named `name`.
    pub async fn subscribe(&self, name: &str) -> broadcast::Receiver<Value> {
        let mut channels = self.channels.write().await;
        let tx = channels
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(self.buffer_size).0);
        tx.subscribe()
    }

    /// Number of live subscribers for `name`.
    pub async fn subscriber_count(&self, name: &str) -> usize {
        let channels = self.channels.read().await;
        channels.get(name).map(|tx| tx.receiver_count()).unwrap_or(0)
    }
}

impl Default for HostEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
