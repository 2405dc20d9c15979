//! Context menu service: the single owner of menu state.
//!
//! The registry, the session, and the event subscription live inside one
//! task. Callers reach it through a cloneable [`ContextMenuHandle`] that
//! sends commands over a queue. Plugin events arrive on the same task, so
//! every mutation is serialized without locks. Only a selection suspends:
//! its round trip runs on a separate task and reports back when done,
//! leaving the service free to handle other work meanwhile.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use plugmenu_core::config::AppConfig;
use plugmenu_core::error::AppError;
use plugmenu_core::events::MenuEvent;
use plugmenu_core::types::{MenuItem, MenuPosition};
use plugmenu_core::AppResult;

use crate::bus::HostEventBus;
use crate::composer::MenuComposer;
use crate::dispatch::{DispatchBridge, DispatchOutcome};
use crate::ingress::{EventIngress, IngressOutcome, IngressStats};
use crate::lifecycle::{CleanupReport, PluginLifecycleHook};
use crate::registry::MenuRegistry;
use crate::session::{MenuSession, MenuState};

/// What a selection refers to.
#[derive(Debug)]
enum SelectTarget {
    Item(MenuItem),
    Id(String),
}

#[derive(Debug)]
enum MenuCommand {
    SubscribeEvents {
        reply: oneshot::Sender<bool>,
    },
    TeardownEvents {
        reply: oneshot::Sender<bool>,
    },
    ApplyEvent {
        payload: Value,
        reply: oneshot::Sender<IngressOutcome>,
    },
    Open {
        context: String,
        position: MenuPosition,
        data: String,
        reply: oneshot::Sender<Option<u64>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
    Select {
        target: SelectTarget,
        reply: oneshot::Sender<Option<DispatchOutcome>>,
    },
    Cleanup {
        plugin_id: String,
        reply: oneshot::Sender<CleanupReport>,
    },
    State {
        reply: oneshot::Sender<MenuState>,
    },
    HasMenuItems {
        context: String,
        reply: oneshot::Sender<bool>,
    },
    Compose {
        context: String,
        reply: oneshot::Sender<Vec<MenuItem>>,
    },
    IngressStats {
        reply: oneshot::Sender<IngressStats>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// A selection whose round trip has ended.
#[derive(Debug)]
struct FinishedDispatch {
    session_id: u64,
    outcome: DispatchOutcome,
    reply: oneshot::Sender<Option<DispatchOutcome>>,
}

enum Step {
    Command(MenuCommand),
    Finished(FinishedDispatch),
    Event(Value),
    Stop,
}

/// Owns all menu state. Run it with [`ContextMenuService::spawn`].
#[derive(Debug)]
pub struct ContextMenuService {
    registry: MenuRegistry,
    session: MenuSession,
    ingress: EventIngress,
    bus: Arc<HostEventBus>,
    bridge: Arc<DispatchBridge>,
    lifecycle: PluginLifecycleHook,
    commands: mpsc::Receiver<MenuCommand>,
    finished_tx: mpsc::UnboundedSender<FinishedDispatch>,
    finished_rx: mpsc::UnboundedReceiver<FinishedDispatch>,
}

impl ContextMenuService {
    /// Creates the service and a handle to it.
    pub fn new(
        config: &AppConfig,
        bus: Arc<HostEventBus>,
        bridge: Arc<DispatchBridge>,
    ) -> (Self, ContextMenuHandle) {
        let (commands_tx, commands) = mpsc::channel(config.service.queue_size.max(1));
        let (finished_tx, finished_rx) = mpsc::unbounded_channel();

        let service = Self {
            registry: MenuRegistry::new(),
            session: MenuSession::new(),
            ingress: EventIngress::new(config.ingress.event_name.clone()),
            lifecycle: PluginLifecycleHook::new(Arc::clone(&bridge)),
            bus,
            bridge,
            commands,
            finished_tx,
            finished_rx,
        };
        (service, ContextMenuHandle { commands: commands_tx })
    }

    /// Creates the service and runs it on a new task.
    pub fn start(
        config: &AppConfig,
        bus: Arc<HostEventBus>,
        bridge: Arc<DispatchBridge>,
    ) -> (ContextMenuHandle, JoinHandle<()>) {
        let (service, handle) = Self::new(config, bus, bridge);
        (handle, service.spawn())
    }

    /// Runs the service on a new task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Processes commands, plugin events, and finished selections until
    /// shut down or every handle is dropped.
    pub async fn run(mut self) {
        info!("Context menu service started");

        loop {
            let step = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => Step::Command(command),
                    None => Step::Stop,
                },
                Some(finished) = self.finished_rx.recv() => Step::Finished(finished),
                Some(payload) = self.ingress.recv(), if self.ingress.is_subscribed() => {
                    Step::Event(payload)
                }
            };

            match step {
                Step::Command(MenuCommand::Shutdown { reply }) => {
                    let _ = reply.send(());
                    break;
                }
                Step::Command(command) => self.handle(command).await,
                Step::Finished(finished) => self.finish_select(finished),
                Step::Event(payload) => {
                    self.ingress.apply(&mut self.registry, payload);
                }
                Step::Stop => break,
            }
        }

        self.ingress.teardown();
        self.session.close();
        info!("Context menu service stopped");
    }

    async fn handle(&mut self, command: MenuCommand) {
        match command {
            MenuCommand::SubscribeEvents { reply } => {
                let _ = reply.send(self.ingress.subscribe(&self.bus).await);
            }
            MenuCommand::TeardownEvents { reply } => {
                let _ = reply.send(self.ingress.teardown());
            }
            MenuCommand::ApplyEvent { payload, reply } => {
                let _ = reply.send(self.ingress.apply(&mut self.registry, payload));
            }
            MenuCommand::Open {
                context,
                position,
                data,
                reply,
            } => {
                let _ = reply.send(self.session.open(&self.registry, &context, position, &data));
            }
            MenuCommand::Close { reply } => {
                self.session.close();
                let _ = reply.send(());
            }
            MenuCommand::Select { target, reply } => self.begin_select(target, reply),
            MenuCommand::Cleanup { plugin_id, reply } => {
                let report = self.lifecycle.cleanup(&mut self.registry, &plugin_id).await;
                let _ = reply.send(report);
            }
            MenuCommand::State { reply } => {
                let _ = reply.send(self.session.state());
            }
            MenuCommand::HasMenuItems { context, reply } => {
                let _ = reply.send(self.registry.has_menu_items(&context));
            }
            MenuCommand::Compose { context, reply } => {
                let _ = reply.send(MenuComposer::new(&self.registry).compose(&context));
            }
            MenuCommand::IngressStats { reply } => {
                let _ = reply.send(self.ingress.stats());
            }
            MenuCommand::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn begin_select(
        &mut self,
        target: SelectTarget,
        reply: oneshot::Sender<Option<DispatchOutcome>>,
    ) {
        if !self.session.is_visible() {
            debug!("Selection ignored, no menu is open");
            let _ = reply.send(None);
            return;
        }

        let item = match target {
            SelectTarget::Item(item) => Some(item),
            SelectTarget::Id(item_id) => {
                let item = self.session.find_item(&item_id).cloned();
                if item.is_none() {
                    warn!(item_id = %item_id, "Selected item is not in the open menu");
                }
                item
            }
        };
        let Some(args) = item.and_then(|item| self.session.callback_for(&item)) else {
            self.session.close();
            let _ = reply.send(None);
            return;
        };

        let session_id = self.session.id();
        let bridge = Arc::clone(&self.bridge);
        let finished = self.finished_tx.clone();
        tokio::spawn(async move {
            let outcome = bridge.dispatch(args).await;
            let _ = finished.send(FinishedDispatch {
                session_id,
                outcome,
                reply,
            });
        });
    }

    fn finish_select(&mut self, finished: FinishedDispatch) {
        if self.session.is_visible() && self.session.id() != finished.session_id {
            debug!(
                session = finished.session_id,
                current = self.session.id(),
                "Closing a menu opened while the selection was pending"
            );
        }
        self.session.close();
        debug!(
            session = finished.session_id,
            outcome = %finished.outcome,
            "Selection finished"
        );
        let _ = finished.reply.send(Some(finished.outcome));
    }
}

/// Cloneable handle to a running [`ContextMenuService`].
///
/// Every call fails with a service-unavailable error once the service
/// has stopped.
#[derive(Debug, Clone)]
pub struct ContextMenuHandle {
    commands: mpsc::Sender<MenuCommand>,
}

impl ContextMenuHandle {
    /// Subscribes to plugin menu events. Returns `false` if already subscribed.
    pub async fn subscribe_events(&self) -> AppResult<bool> {
        self.request(|reply| MenuCommand::SubscribeEvents { reply })
            .await
    }

    /// Unsubscribes from plugin menu events. Returns `false` if not subscribed.
    pub async fn teardown_events(&self) -> AppResult<bool> {
        self.request(|reply| MenuCommand::TeardownEvents { reply })
            .await
    }

    /// Applies one raw `plugin-context-menu` payload.
    pub async fn apply_event(&self, payload: Value) -> AppResult<IngressOutcome> {
        self.request(|reply| MenuCommand::ApplyEvent { payload, reply })
            .await
    }

    /// Applies a typed menu event.
    pub async fn apply(&self, event: &MenuEvent) -> AppResult<IngressOutcome> {
        self.apply_event(event.to_value()).await
    }

    /// Opens a menu. Returns the session id, or `None` if nothing is shown.
    pub async fn open(
        &self,
        context: impl Into<String>,
        position: MenuPosition,
        data: impl Into<String>,
    ) -> AppResult<Option<u64>> {
        let context = context.into();
        let data = data.into();
        self.request(|reply| MenuCommand::Open {
            context,
            position,
            data,
            reply,
        })
        .await
    }

    /// Closes the menu.
    pub async fn close(&self) -> AppResult<()> {
        self.request(|reply| MenuCommand::Close { reply }).await
    }

    /// Selects `item` in the open menu and waits for the dispatch.
    ///
    /// Returns `None` when no menu was open. The menu is closed once the
    /// dispatch ends, whatever the outcome.
    pub async fn select(&self, item: MenuItem) -> AppResult<Option<DispatchOutcome>> {
        self.request(|reply| MenuCommand::Select {
            target: SelectTarget::Item(item),
            reply,
        })
        .await
    }

    /// Selects an item of the open menu by id.
    ///
    /// An id that is not in the menu dispatches nothing and closes the menu.
    pub async fn select_item(
        &self,
        item_id: impl Into<String>,
    ) -> AppResult<Option<DispatchOutcome>> {
        let item_id = item_id.into();
        self.request(|reply| MenuCommand::Select {
            target: SelectTarget::Id(item_id),
            reply,
        })
        .await
    }

    /// Purges an unloaded plugin's items and dispatch route.
    pub async fn cleanup_plugin(&self, plugin_id: impl Into<String>) -> AppResult<CleanupReport> {
        let plugin_id = plugin_id.into();
        self.request(|reply| MenuCommand::Cleanup { plugin_id, reply })
            .await
    }

    /// Snapshot of the menu session.
    pub async fn state(&self) -> AppResult<MenuState> {
        self.request(|reply| MenuCommand::State { reply }).await
    }

    /// Whether `context` has its own registered items.
    pub async fn has_menu_items(&self, context: impl Into<String>) -> AppResult<bool> {
        let context = context.into();
        self.request(|reply| MenuCommand::HasMenuItems { context, reply })
            .await
    }

    /// The items a menu opened in `context` would show.
    pub async fn compose(&self, context: impl Into<String>) -> AppResult<Vec<MenuItem>> {
        let context = context.into();
        self.request(|reply| MenuCommand::Compose { context, reply })
            .await
    }

    /// Event ingress counters.
    pub async fn ingress_stats(&self) -> AppResult<IngressStats> {
        self.request(|reply| MenuCommand::IngressStats { reply })
            .await
    }

    /// Stops the service.
    pub async fn shutdown(&self) -> AppResult<()> {
        self.request(|reply| MenuCommand::Shutdown { reply }).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> MenuCommand,
    ) -> AppResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| service_stopped())?;
        response.await.map_err(|_| service_stopped())
    }
}

fn service_stopped() -> AppError {
    AppError::service_unavailable("Context menu service is not running")
}
