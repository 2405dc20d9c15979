//! Reference plugin worker.
//!
//! Registers the menus described by `PLUGMENU_WORKER_MENUS` (a JSON list
//! of `{context, items}`) on startup and answers `context_menu_callback`
//! invocations on stdin. Every handled selection is echoed back as a
//! `context-menu-selected` event. `PLUGMENU_WORKER_DELAY_MS` delays each
//! reply and `PLUGMENU_WORKER_FAIL` makes every callback fail with its
//! value as the message. Diagnostics go to stderr; stdout carries only
//! protocol lines.

use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use plugmenu_core::events::{
    CONTEXT_MENU_CALLBACK, CallbackArgs, MenuEvent, PLUGIN_CONTEXT_MENU_EVENT,
};
use plugmenu_core::types::MenuItemSpec;
use plugmenu_plugin::transport::{PLUGIN_ID_ENV, WireMessage};

const MENUS_ENV: &str = "PLUGMENU_WORKER_MENUS";
const DELAY_ENV: &str = "PLUGMENU_WORKER_DELAY_MS";
const FAIL_ENV: &str = "PLUGMENU_WORKER_FAIL";
const SELECTED_EVENT: &str = "context-menu-selected";

#[derive(Debug, Deserialize)]
struct MenuSpec {
    context: String,
    #[serde(default)]
    items: Vec<MenuItemSpec>,
}

#[derive(Debug)]
struct WorkerSettings {
    plugin_id: String,
    menus: Vec<MenuSpec>,
    delay: Duration,
    failure: Option<String>,
}

impl WorkerSettings {
    fn from_env() -> Result<Self> {
        let plugin_id =
            std::env::var(PLUGIN_ID_ENV).with_context(|| format!("{PLUGIN_ID_ENV} is not set"))?;

        let menus = match std::env::var(MENUS_ENV) {
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("{MENUS_ENV} is not a valid menu list"))?,
            Err(_) => Vec::new(),
        };

        let delay = std::env::var(DELAY_ENV)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or_default();

        let failure = std::env::var(FAIL_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .map(|v| {
                if v == "1" || v.eq_ignore_ascii_case("true") {
                    "worker callback failed".to_string()
                } else {
                    v
                }
            });

        Ok(Self {
            plugin_id,
            menus,
            delay,
            failure,
        })
    }
}

fn main() -> Result<()> {
    fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = WorkerSettings::from_env()?;
    let mut stdout = io::stdout();

    for menu in &settings.menus {
        let event = MenuEvent::register(&settings.plugin_id, &menu.context, menu.items.clone());
        emit(&mut stdout, PLUGIN_CONTEXT_MENU_EVENT, event.to_value())?;
    }
    info!(
        plugin_id = %settings.plugin_id,
        menus = settings.menus.len(),
        "Worker ready"
    );

    for line in io::stdin().lock().lines() {
        let line = line.context("reading stdin")?;
        if line.trim().is_empty() {
            continue;
        }

        let message = match WireMessage::from_line(&line) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed line");
                continue;
            }
        };

        match message {
            WireMessage::Invoke {
                request_id,
                command,
                args,
            } => {
                let result = handle_invoke(&mut stdout, &settings, &command, args);
                let reply = WireMessage::InvokeResult {
                    request_id,
                    ok: result.is_ok(),
                    error: result.err(),
                };
                write_message(&mut stdout, &reply)?;
            }
            WireMessage::Cancel { request_id, reason } => {
                debug!(request_id = %request_id, reason = %reason, "Host stopped waiting");
            }
            WireMessage::Shutdown { reason } => {
                info!(reason = %reason, "Shutdown requested");
                for menu in &settings.menus {
                    let event = MenuEvent::unregister(&settings.plugin_id, &menu.context);
                    emit(&mut stdout, PLUGIN_CONTEXT_MENU_EVENT, event.to_value())?;
                }
                break;
            }
            WireMessage::InvokeResult { .. } | WireMessage::Emit { .. } => {
                warn!("Ignoring worker-bound message sent to worker");
            }
        }
    }

    Ok(())
}

fn handle_invoke(
    stdout: &mut impl Write,
    settings: &WorkerSettings,
    command: &str,
    args: Value,
) -> std::result::Result<(), String> {
    if command != CONTEXT_MENU_CALLBACK {
        return Err(format!("unknown command `{command}`"));
    }
    let args: CallbackArgs =
        serde_json::from_value(args).map_err(|e| format!("invalid callback args: {e}"))?;

    info!(
        context = %args.context,
        item_id = %args.item_id,
        target_data = %args.target_data,
        "Menu item selected"
    );

    if !settings.delay.is_zero() {
        thread::sleep(settings.delay);
    }

    let payload = serde_json::to_value(&args).map_err(|e| e.to_string())?;
    emit(stdout, SELECTED_EVENT, payload).map_err(|e| e.to_string())?;

    match &settings.failure {
        Some(message) => Err(message.clone()),
        None => Ok(()),
    }
}

fn emit(stdout: &mut impl Write, event: &str, payload: Value) -> Result<()> {
    write_message(
        stdout,
        &WireMessage::Emit {
            event: event.to_string(),
            payload,
        },
    )
}

fn write_message(stdout: &mut impl Write, message: &WireMessage) -> Result<()> {
    let line = message.to_line()?;
    stdout.write_all(line.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
