//! Command channels: how a callback crosses the process boundary.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use plugmenu_core::events::CallbackArgs;
use plugmenu_core::types::RequestId;

/// One outbound callback command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackRequest {
    /// Correlation id matched against the reply.
    pub request_id: RequestId,
    /// Command name, normally `context_menu_callback`.
    pub command: String,
    /// Command arguments.
    pub args: CallbackArgs,
}

/// A plugin's answer to a [`CallbackRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackReply {
    /// Correlation id echoed by the plugin.
    pub request_id: RequestId,
    /// Whether the plugin handled the callback.
    pub ok: bool,
    /// Failure description when `ok` is false.
    pub error: Option<String>,
}

impl CallbackReply {
    /// Successful reply to `request_id`.
    pub fn ok(request_id: RequestId) -> Self {
        Self {
            request_id,
            ok: true,
            error: None,
        }
    }

    /// Failed reply to `request_id`.
    pub fn failed(request_id: RequestId, error: impl Into<String>) -> Self {
        Self {
            request_id,
            ok: false,
            error: Some(error.into()),
        }
    }
}

/// Failures of the channel itself, as opposed to plugin-reported errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// No channel is routed for the plugin.
    #[error("no route to plugin `{0}`")]
    NoRoute(String),
    /// Writing to or reading from the plugin failed.
    #[error("transport I/O failed: {0}")]
    Io(String),
    /// The plugin process is gone.
    #[error("plugin channel closed")]
    Closed,
    /// The reply carried another request's id.
    #[error("reply `{got}` does not match request `{expected}`")]
    Mismatch {
        /// Id that was sent.
        expected: RequestId,
        /// Id that came back.
        got: RequestId,
    },
    /// A message could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<std::io::Error> for ChannelError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ChannelError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

/// Delivers callback commands to one plugin.
#[async_trait]
pub trait CommandChannel: Send + Sync + fmt::Debug {
    /// Plugin this channel reaches.
    fn plugin_id(&self) -> &str;

    /// Sends `request` and waits for the reply.
    async fn invoke(&self, request: &CallbackRequest) -> Result<CallbackReply, ChannelError>;

    /// Best-effort notice that the caller stopped waiting for `request_id`.
    async fn cancel(&self, _request_id: RequestId, _reason: &str) {}
}

/// Callback logic of an in-process plugin.
#[async_trait]
pub trait CallbackHandler: Send + Sync + fmt::Debug {
    /// Plugin id this handler serves.
    fn plugin_id(&self) -> &str;

    /// Handles a menu selection. An `Err` is reported back as a plugin error.
    async fn on_select(&self, args: &CallbackArgs) -> Result<(), String>;
}

type CallbackFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;
type CallbackFn = dyn Fn(CallbackArgs) -> CallbackFuture + Send + Sync;

/// A [`CallbackHandler`] backed by an async closure.
pub struct ClosureCallback {
    id: String,
    handler: Arc<CallbackFn>,
}

impl fmt::Debug for ClosureCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosureCallback")
            .field("id", &self.id)
            .field("handler", &"<closure>")
            .finish()
    }
}

impl ClosureCallback {
    /// Wraps `handler` as the callback of `plugin_id`.
    pub fn new<F, Fut>(plugin_id: &str, handler: F) -> Self
    where
        F: Fn(CallbackArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        Self {
            id: plugin_id.to_string(),
            handler: Arc::new(move |args| Box::pin(handler(args)) as CallbackFuture),
        }
    }
}

#[async_trait]
impl CallbackHandler for ClosureCallback {
    fn plugin_id(&self) -> &str {
        &self.id
    }

    async fn on_select(&self, args: &CallbackArgs) -> Result<(), String> {
        (self.handler)(args.clone()).await
    }
}

/// Channel to a plugin living in the host process.
#[derive(Debug)]
pub struct InProcessChannel {
    handler: Arc<dyn CallbackHandler>,
}

impl InProcessChannel {
    /// Wraps a handler.
    pub fn new(handler: Arc<dyn CallbackHandler>) -> Self {
        Self { handler }
    }

    /// Wraps a handler into an `Arc<dyn CommandChannel>`.
    pub fn wrap(handler: Arc<dyn CallbackHandler>) -> Arc<dyn CommandChannel> {
        Arc::new(Self::new(handler))
    }
}

#[async_trait]
impl CommandChannel for InProcessChannel {
    fn plugin_id(&self) -> &str {
        self.handler.plugin_id()
    }

    async fn invoke(&self, request: &CallbackRequest) -> Result<CallbackReply, ChannelError> {
        Ok(match self.handler.on_select(&request.args).await {
            Ok(()) => CallbackReply::ok(request.request_id),
            Err(error) => CallbackReply::failed(request.request_id, error),
        })
    }
}
