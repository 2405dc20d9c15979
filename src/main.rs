//! plugmenu host
//!
//! Runs the context menu service, spawns the configured plugin workers,
//! and serves menu requests read as JSON lines from stdin. Each request
//! gets one JSON line on stdout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, mpsc};
use tracing_subscriber::{EnvFilter, fmt};

use plugmenu_core::config::AppConfig;
use plugmenu_core::error::AppError;
use plugmenu_core::types::MenuPosition;
use plugmenu_plugin::dispatch::DispatchOutcome;
use plugmenu_plugin::lifecycle::CleanupReport;
use plugmenu_plugin::{
    ContextMenuHandle, ContextMenuService, DispatchBridge, HostEventBus, MenuState, StdioChannel,
};

/// How long a worker gets to exit after a shutdown notice.
const WORKER_GRACE: Duration = Duration::from_secs(2);

/// plugmenu: plugin-extensible context menu host
#[derive(Debug, Parser)]
#[command(name = "plugmenu-host", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Environment overlay loaded from config/{env}.toml
    #[arg(short, long, default_value = "development")]
    env: String,
}

/// One request on the host's stdin.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum UiRequest {
    Open {
        context: String,
        x: f64,
        y: f64,
        #[serde(default)]
        data: String,
    },
    Select {
        item_id: String,
    },
    Close,
    State,
    HasItems {
        context: String,
    },
    Unload {
        plugin_id: String,
    },
}

/// One response on the host's stdout.
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum UiResponse {
    Opened {
        session: Option<u64>,
        state: MenuState,
    },
    Selected {
        item_id: String,
        outcome: Option<DispatchOutcome>,
    },
    Closed,
    State {
        state: MenuState,
    },
    HasItems {
        context: String,
        has_items: bool,
    },
    Unloaded {
        report: CleanupReport,
    },
    Error {
        message: String,
    },
}

type Workers = Arc<Mutex<HashMap<String, Arc<StdioChannel>>>>;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_configuration(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Host error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file, environment overlay, and variables
fn load_configuration(cli: &Cli) -> Result<AppConfig, AppError> {
    let config = AppConfig::load(&cli.config, &cli.env)?;
    config.validate()?;
    Ok(config)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    // stdout carries responses, so logs go to stderr
    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

/// Main host run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting plugmenu host v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Event bus, dispatch bridge, menu service ─────────
    let bus = Arc::new(HostEventBus::new(config.ingress.buffer_size));
    let bridge = Arc::new(DispatchBridge::new(&config.dispatch));
    let (handle, service_task) =
        ContextMenuService::start(&config, Arc::clone(&bus), Arc::clone(&bridge));

    // Subscribe before workers start so their first registrations land.
    handle.subscribe_events().await?;

    // ── Step 2: Plugin workers ───────────────────────────────────
    let workers: Workers = Arc::new(Mutex::new(HashMap::new()));
    start_workers(&config, &bus, &bridge, &handle, &workers).await;
    tracing::info!("{} plugin worker(s) running", workers.lock().await.len());

    // ── Step 3: Serve requests until stdin ends or Ctrl+C ────────
    let (responses, response_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_responses(response_rx));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => handle_line(&line, &handle, &workers, &responses).await,
                None => {
                    tracing::info!("Request stream ended");
                    break;
                }
            },
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    // ── Step 4: Shutdown ─────────────────────────────────────────
    handle.teardown_events().await?;
    let running: Vec<Arc<StdioChannel>> = workers.lock().await.drain().map(|(_, w)| w).collect();
    for worker in running {
        worker.shutdown("host shutdown", WORKER_GRACE).await;
    }
    handle.shutdown().await?;
    if let Err(e) = service_task.await {
        tracing::error!("Context menu service task failed: {}", e);
    }

    drop(responses);
    if let Err(e) = writer.await {
        tracing::error!("Response writer task failed: {}", e);
    }

    tracing::info!("plugmenu host stopped");
    Ok(())
}

/// Spawn every configured worker, route it, and watch it for exit
async fn start_workers(
    config: &AppConfig,
    bus: &Arc<HostEventBus>,
    bridge: &Arc<DispatchBridge>,
    handle: &ContextMenuHandle,
    workers: &Workers,
) {
    for plugin in &config.plugins {
        let channel = match StdioChannel::spawn(plugin, Arc::clone(bus)) {
            Ok(channel) => channel,
            Err(e) => {
                tracing::error!(plugin_id = %plugin.id, error = %e, "Failed to start plugin worker");
                continue;
            }
        };

        bridge.add_route(channel.clone()).await;
        workers
            .lock()
            .await
            .insert(plugin.id.clone(), Arc::clone(&channel));

        let plugin_id = plugin.id.clone();
        let handle = handle.clone();
        let workers = Arc::clone(workers);
        tokio::spawn(async move {
            channel.closed().await;
            // An explicit unload removes the worker first and cleans up itself.
            if workers.lock().await.remove(&plugin_id).is_none() {
                return;
            }
            tracing::warn!(plugin_id = %plugin_id, "Plugin worker exited, purging its menus");
            if let Err(e) = handle.cleanup_plugin(plugin_id.as_str()).await {
                tracing::debug!(plugin_id = %plugin_id, error = %e, "Cleanup skipped");
            }
        });
    }
}

async fn handle_line(
    line: &str,
    handle: &ContextMenuHandle,
    workers: &Workers,
    responses: &mpsc::UnboundedSender<UiResponse>,
) {
    let request = match serde_json::from_str::<UiRequest>(line) {
        Ok(request) => request,
        Err(e) => {
            let _ = responses.send(UiResponse::Error {
                message: format!("invalid request: {e}"),
            });
            return;
        }
    };

    // Selections and unloads wait on a plugin, so they answer from their own task.
    match request {
        UiRequest::Select { item_id } => {
            let handle = handle.clone();
            let responses = responses.clone();
            tokio::spawn(async move {
                let response = match handle.select_item(item_id.as_str()).await {
                    Ok(outcome) => UiResponse::Selected { item_id, outcome },
                    Err(e) => error_response(e),
                };
                let _ = responses.send(response);
            });
        }
        UiRequest::Unload { plugin_id } => {
            let handle = handle.clone();
            let workers = Arc::clone(workers);
            let responses = responses.clone();
            tokio::spawn(async move {
                let response = match unload(plugin_id, &handle, &workers).await {
                    Ok(report) => UiResponse::Unloaded { report },
                    Err(e) => error_response(e),
                };
                let _ = responses.send(response);
            });
        }
        request => {
            let response = match serve(request, handle).await {
                Ok(response) => response,
                Err(e) => error_response(e),
            };
            let _ = responses.send(response);
        }
    }
}

/// Stops the plugin's worker, if it runs one, and purges its menus
async fn unload(
    plugin_id: String,
    handle: &ContextMenuHandle,
    workers: &Workers,
) -> Result<CleanupReport, AppError> {
    let worker = workers.lock().await.remove(&plugin_id);
    if let Some(worker) = worker {
        worker.shutdown("unloaded", WORKER_GRACE).await;
    }
    handle.cleanup_plugin(plugin_id).await
}

async fn serve(request: UiRequest, handle: &ContextMenuHandle) -> Result<UiResponse, AppError> {
    Ok(match request {
        UiRequest::Open {
            context,
            x,
            y,
            data,
        } => {
            let session = handle.open(context, MenuPosition::new(x, y), data).await?;
            UiResponse::Opened {
                session,
                state: handle.state().await?,
            }
        }
        UiRequest::Close => {
            handle.close().await?;
            UiResponse::Closed
        }
        UiRequest::State => UiResponse::State {
            state: handle.state().await?,
        },
        UiRequest::HasItems { context } => UiResponse::HasItems {
            has_items: handle.has_menu_items(context.as_str()).await?,
            context,
        },
        UiRequest::Select { .. } | UiRequest::Unload { .. } => {
            return Err(AppError::internal("request must be served on its own task"));
        }
    })
}

fn error_response(e: AppError) -> UiResponse {
    UiResponse::Error {
        message: e.to_string(),
    }
}

async fn write_responses(mut responses: mpsc::UnboundedReceiver<UiResponse>) {
    let mut stdout = tokio::io::stdout();
    while let Some(response) = responses.recv().await {
        let mut line = match serde_json::to_string(&response) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("Failed to encode response: {}", e);
                continue;
            }
        };
        line.push('\n');
        if let Err(e) = stdout.write_all(line.as_bytes()).await {
            tracing::error!("Failed to write response: {}", e);
            break;
        }
        let _ = stdout.flush().await;
    }
}
