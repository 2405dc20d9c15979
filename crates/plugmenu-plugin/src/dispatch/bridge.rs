//! Dispatch bridge: routes menu selections to the owning plugin.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use plugmenu_core::config::DispatchConfig;
use plugmenu_core::events::CallbackArgs;
use plugmenu_core::types::RequestId;

use super::channel::{CallbackRequest, ChannelError, CommandChannel};
use super::outcome::DispatchOutcome;

/// Sends `context_menu_callback` commands over per-plugin channels.
#[derive(Debug)]
pub struct DispatchBridge {
    /// Plugin id → channel reaching that plugin.
    routes: RwLock<HashMap<String, Arc<dyn CommandChannel>>>,
    /// Upper bound on one round trip.
    timeout: Duration,
    /// Command name put on every request.
    command_name: String,
}

impl DispatchBridge {
    /// Creates a bridge with no routes.
    pub fn new(config: &DispatchConfig) -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
            timeout: config.timeout(),
            command_name: config.command_name.clone(),
        }
    }

    /// Routes the channel's plugin id to `channel`, replacing any prior route.
    pub async fn add_route(&self, channel: Arc<dyn CommandChannel>) {
        let plugin_id = channel.plugin_id().to_string();
        let replaced = self
            .routes
            .write()
            .await
            .insert(plugin_id.clone(), channel)
            .is_some();
        info!(plugin_id = %plugin_id, replaced = replaced, "Dispatch route added");
    }

    /// Drops the route for `plugin_id`. Returns whether one existed.
    pub async fn remove_route(&self, plugin_id: &str) -> bool {
        let removed = self.routes.write().await.remove(plugin_id).is_some();
        if removed {
            info!(plugin_id = %plugin_id, "Dispatch route removed");
        }
        removed
    }

    /// Whether `plugin_id` is routable.
    pub async fn has_route(&self, plugin_id: &str) -> bool {
        self.routes.read().await.contains_key(plugin_id)
    }

    /// Number of routed plugins.
    pub async fn route_count(&self) -> usize {
        self.routes.read().await.len()
    }

    /// Wraps `args` in a request with a fresh correlation id.
    pub fn build_request(&self, args: CallbackArgs) -> CallbackRequest {
        CallbackRequest {
            request_id: RequestId::new(),
            command: self.command_name.clone(),
            args,
        }
    }

    /// Sends a callback for `args` and waits, bounded by the timeout.
    ///
    /// Never fails: every way the round trip can end is folded into the
    /// returned outcome, which is also logged.
    pub async fn dispatch(&self, args: CallbackArgs) -> DispatchOutcome {
        let request = self.build_request(args);
        let outcome = self.round_trip(&request).await;

        match &outcome {
            DispatchOutcome::Delivered { request_id } => info!(
                plugin_id = %request.args.plugin_id,
                item_id = %request.args.item_id,
                request_id = %request_id,
                "Menu callback delivered"
            ),
            DispatchOutcome::TimedOut {
                request_id,
                timeout_ms,
            } => warn!(
                plugin_id = %request.args.plugin_id,
                item_id = %request.args.item_id,
                request_id = %request_id,
                timeout_ms = timeout_ms,
                "Menu callback timed out"
            ),
            DispatchOutcome::PluginError {
                request_id,
                message,
            } => warn!(
                plugin_id = %request.args.plugin_id,
                item_id = %request.args.item_id,
                request_id = %request_id,
                error = %message,
                "Menu callback failed"
            ),
        }
        outcome
    }

    async fn round_trip(&self, request: &CallbackRequest) -> DispatchOutcome {
        let request_id = request.request_id;
        let plugin_id = &request.args.plugin_id;

        let channel = self.routes.read().await.get(plugin_id).cloned();
        let Some(channel) = channel else {
            return plugin_error(request_id, ChannelError::NoRoute(plugin_id.clone()));
        };

        debug!(
            plugin_id = %plugin_id,
            request_id = %request_id,
            command = %request.command,
            "Dispatching menu callback"
        );

        match tokio::time::timeout(self.timeout, channel.invoke(request)).await {
            Ok(Ok(reply)) if reply.request_id != request_id => plugin_error(
                request_id,
                ChannelError::Mismatch {
                    expected: request_id,
                    got: reply.request_id,
                },
            ),
            Ok(Ok(reply)) if reply.ok => DispatchOutcome::Delivered { request_id },
            Ok(Ok(reply)) => DispatchOutcome::PluginError {
                request_id,
                message: reply
                    .error
                    .unwrap_or_else(|| "plugin reported failure".to_string()),
            },
            Ok(Err(err)) => plugin_error(request_id, err),
            Err(_) => {
                channel.cancel(request_id, "timeout").await;
                DispatchOutcome::TimedOut {
                    request_id,
                    timeout_ms: self.timeout.as_millis() as u64,
                }
            }
        }
    }
}

fn plugin_error(request_id: RequestId, err: ChannelError) -> DispatchOutcome {
    DispatchOutcome::PluginError {
        request_id,
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::dispatch::channel::{CallbackReply, ClosureCallback, InProcessChannel};

    fn args(plugin_id: &str) -> CallbackArgs {
        CallbackArgs {
            plugin_id: plugin_id.to_string(),
            context: "server-row".to_string(),
            item_id: "a1".to_string(),
            target_data: "srv-1".to_string(),
        }
    }

    fn bridge(timeout_ms: u64) -> DispatchBridge {
        DispatchBridge::new(&DispatchConfig {
            timeout_ms,
            ..DispatchConfig::default()
        })
    }

    #[derive(Debug, Default)]
    struct SilentChannel {
        cancelled: Mutex<Vec<RequestId>>,
    }

    #[async_trait]
    impl CommandChannel for SilentChannel {
        fn plugin_id(&self) -> &str {
            "silent"
        }

        async fn invoke(&self, _request: &CallbackRequest) -> Result<CallbackReply, ChannelError> {
            std::future::pending().await
        }

        async fn cancel(&self, request_id: RequestId, _reason: &str) {
            self.cancelled.lock().unwrap().push(request_id);
        }
    }

    #[derive(Debug)]
    struct WrongIdChannel;

    #[async_trait]
    impl CommandChannel for WrongIdChannel {
        fn plugin_id(&self) -> &str {
            "wrong"
        }

        async fn invoke(&self, _request: &CallbackRequest) -> Result<CallbackReply, ChannelError> {
            Ok(CallbackReply::ok(RequestId::new()))
        }
    }

    #[tokio::test]
    async fn test_delivered() {
        let bridge = bridge(1000);
        bridge
            .add_route(InProcessChannel::wrap(Arc::new(ClosureCallback::new(
                "A",
                |_| async { Ok(()) },
            ))))
            .await;

        let outcome = bridge.dispatch(args("A")).await;
        assert!(outcome.is_delivered());
    }

    #[tokio::test]
    async fn test_unknown_plugin_is_plugin_error() {
        let bridge = bridge(1000);
        let outcome = bridge.dispatch(args("ghost")).await;
        assert!(matches!(
            outcome,
            DispatchOutcome::PluginError { ref message, .. } if message.contains("ghost")
        ));
    }

    #[tokio::test]
    async fn test_plugin_failure_is_plugin_error() {
        let bridge = bridge(1000);
        bridge
            .add_route(InProcessChannel::wrap(Arc::new(ClosureCallback::new(
                "A",
                |_| async { Err("nope".to_string()) },
            ))))
            .await;

        let outcome = bridge.dispatch(args("A")).await;
        assert!(matches!(
            outcome,
            DispatchOutcome::PluginError { ref message, .. } if message == "nope"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_cancels_request() {
        let bridge = bridge(50);
        let channel = Arc::new(SilentChannel::default());
        bridge.add_route(channel.clone()).await;

        let outcome = bridge.dispatch(args("silent")).await;
        assert!(matches!(
            outcome,
            DispatchOutcome::TimedOut { timeout_ms: 50, .. }
        ));
        assert_eq!(
            channel.cancelled.lock().unwrap().as_slice(),
            &[outcome.request_id()]
        );
    }

    #[tokio::test]
    async fn test_mismatched_reply_is_plugin_error() {
        let bridge = bridge(1000);
        bridge.add_route(Arc::new(WrongIdChannel)).await;

        let outcome = bridge.dispatch(args("wrong")).await;
        assert!(matches!(outcome, DispatchOutcome::PluginError { .. }));
    }

    #[tokio::test]
    async fn test_remove_route() {
        let bridge = bridge(1000);
        bridge.add_route(Arc::new(WrongIdChannel)).await;
        assert!(bridge.has_route("wrong").await);

        assert!(bridge.remove_route("wrong").await);
        assert!(!bridge.remove_route("wrong").await);
        assert_eq!(bridge.route_count().await, 0);
    }

    #[test]
    fn test_requests_get_fresh_ids() {
        let bridge = bridge(1000);
        let first = bridge.build_request(args("A"));
        let second = bridge.build_request(args("A"));
        assert_ne!(first.request_id, second.request_id);
        assert_eq!(first.command, "context_menu_callback");
    }
}
