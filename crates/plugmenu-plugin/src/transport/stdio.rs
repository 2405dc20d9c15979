//! Command channel to a plugin worker process over its stdin/stdout.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex as AsyncMutex, oneshot, watch};
use tracing::{debug, info, warn};

use plugmenu_core::config::PluginProcessConfig;
use plugmenu_core::error::{AppError, ErrorKind};
use plugmenu_core::events::HostEvent;
use plugmenu_core::types::RequestId;
use plugmenu_core::AppResult;

use super::PLUGIN_ID_ENV;
use super::protocol::WireMessage;
use crate::bus::HostEventBus;
use crate::dispatch::{CallbackReply, CallbackRequest, ChannelError, CommandChannel};

type PendingReplies = Mutex<HashMap<RequestId, oneshot::Sender<CallbackReply>>>;

/// A running plugin worker reachable as a [`CommandChannel`].
///
/// Replies are matched to requests by id. Events the worker emits are
/// published on the host event bus. When the worker exits, waiting
/// requests fail with [`ChannelError::Closed`].
#[derive(Debug)]
pub struct StdioChannel {
    plugin_id: String,
    stdin: AsyncMutex<ChildStdin>,
    pending: Arc<PendingReplies>,
    closed: watch::Receiver<bool>,
    kill: Mutex<Option<oneshot::Sender<()>>>,
}

impl StdioChannel {
    /// Spawns the worker described by `config` and starts reading its output.
    pub fn spawn(config: &PluginProcessConfig, bus: Arc<HostEventBus>) -> AppResult<Arc<Self>> {
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .envs(config.env_pairs())
            .env(PLUGIN_ID_ENV, &config.id)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Plugin,
                    format!("Failed to spawn worker for '{}'", config.id),
                    e,
                )
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::plugin("Worker stdin is not piped"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::plugin("Worker stdout is not piped"))?;

        info!(
            plugin_id = %config.id,
            command = %config.command,
            pid = child.id().unwrap_or_default(),
            "Plugin worker started"
        );

        let pending = Arc::new(PendingReplies::default());
        let (closed_tx, closed_rx) = watch::channel(false);
        let (kill_tx, kill_rx) = oneshot::channel();

        let reader = WorkerReader {
            plugin_id: config.id.clone(),
            child,
            pending: Arc::clone(&pending),
            bus,
            closed: closed_tx,
        };
        tokio::spawn(reader.run(stdout, kill_rx));

        Ok(Arc::new(Self {
            plugin_id: config.id.clone(),
            stdin: AsyncMutex::new(stdin),
            pending,
            closed: closed_rx,
            kill: Mutex::new(Some(kill_tx)),
        }))
    }

    /// Whether the worker's output has ended.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once the worker's output has ended.
    pub async fn closed(&self) {
        let mut closed = self.closed.clone();
        let _ = closed.wait_for(|closed| *closed).await;
    }

    /// Number of requests awaiting a reply.
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Asks the worker to exit, killing it if it outlives `grace`.
    pub async fn shutdown(&self, reason: &str, grace: Duration) {
        if self.is_closed() {
            return;
        }
        let message = WireMessage::Shutdown {
            reason: reason.to_string(),
        };
        if let Err(e) = self.send(&message).await {
            debug!(plugin_id = %self.plugin_id, error = %e, "Shutdown notice not delivered");
        }

        if tokio::time::timeout(grace, self.closed()).await.is_err() {
            warn!(plugin_id = %self.plugin_id, "Worker ignored shutdown, killing it");
            if let Some(kill) = lock(&self.kill).take() {
                let _ = kill.send(());
            }
            self.closed().await;
        }
    }

    async fn send(&self, message: &WireMessage) -> Result<(), ChannelError> {
        let line = message.to_line()?;
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl CommandChannel for StdioChannel {
    fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    async fn invoke(&self, request: &CallbackRequest) -> Result<CallbackReply, ChannelError> {
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(request.request_id, tx);
        let _pending = PendingGuard {
            pending: &self.pending,
            request_id: request.request_id,
        };

        // The reader marks the channel closed before draining, so a request
        // registered after the drain is caught here.
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }

        let message = WireMessage::Invoke {
            request_id: request.request_id.to_string(),
            command: request.command.clone(),
            args: serde_json::to_value(&request.args)?,
        };
        self.send(&message).await?;

        rx.await.map_err(|_| ChannelError::Closed)
    }

    async fn cancel(&self, request_id: RequestId, reason: &str) {
        let message = WireMessage::Cancel {
            request_id: request_id.to_string(),
            reason: reason.to_string(),
        };
        if let Err(e) = self.send(&message).await {
            debug!(
                plugin_id = %self.plugin_id,
                request_id = %request_id,
                error = %e,
                "Cancel notice not delivered"
            );
        }
    }
}

/// Removes a pending entry when the waiting request ends, however it ends.
struct PendingGuard<'a> {
    pending: &'a PendingReplies,
    request_id: RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(self.pending).remove(&self.request_id);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the child process and routes its output.
struct WorkerReader {
    plugin_id: String,
    child: Child,
    pending: Arc<PendingReplies>,
    bus: Arc<HostEventBus>,
    closed: watch::Sender<bool>,
}

impl WorkerReader {
    async fn run(mut self, stdout: ChildStdout, mut kill: oneshot::Receiver<()>) {
        let mut lines = BufReader::new(stdout).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => self.handle_line(&line).await,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(plugin_id = %self.plugin_id, error = %e, "Worker output unreadable");
                        break;
                    }
                },
                _ = &mut kill => {
                    if let Err(e) = self.child.start_kill() {
                        warn!(plugin_id = %self.plugin_id, error = %e, "Failed to kill worker");
                    }
                    break;
                }
            }
        }

        self.closed.send_replace(true);
        let abandoned = {
            let mut pending = lock(&self.pending);
            let count = pending.len();
            pending.clear();
            count
        };

        match self.child.wait().await {
            Ok(status) => info!(
                plugin_id = %self.plugin_id,
                status = %status,
                abandoned_requests = abandoned,
                "Plugin worker exited"
            ),
            Err(e) => warn!(
                plugin_id = %self.plugin_id,
                error = %e,
                "Failed to reap plugin worker"
            ),
        }
    }

    async fn handle_line(&self, line: &str) {
        if line.trim().is_empty() {
            return;
        }

        match WireMessage::from_line(line) {
            Ok(WireMessage::InvokeResult {
                request_id,
                ok,
                error,
            }) => self.complete(&request_id, ok, error),
            Ok(WireMessage::Emit { event, payload }) => {
                debug!(plugin_id = %self.plugin_id, event = %event, "Worker emitted event");
                self.bus.emit(HostEvent::new(event, payload)).await;
            }
            Ok(other) => {
                warn!(plugin_id = %self.plugin_id, message = ?other, "Unexpected message from worker");
            }
            Err(e) => {
                warn!(plugin_id = %self.plugin_id, error = %e, "Malformed line from worker");
            }
        }
    }

    fn complete(&self, request_id: &str, ok: bool, error: Option<String>) {
        let Ok(request_id) = request_id.parse::<RequestId>() else {
            warn!(plugin_id = %self.plugin_id, request_id = %request_id, "Reply with invalid request id");
            return;
        };

        match lock(&self.pending).remove(&request_id) {
            Some(reply) => {
                let _ = reply.send(CallbackReply {
                    request_id,
                    ok,
                    error,
                });
            }
            None => debug!(
                plugin_id = %self.plugin_id,
                request_id = %request_id,
                "Reply for unknown or expired request"
            ),
        }
    }
}
