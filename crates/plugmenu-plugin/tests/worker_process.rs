//! Round trips against the real `plugmenu-worker` binary.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use plugmenu_core::config::{AppConfig, PluginProcessConfig};
use plugmenu_core::types::MenuPosition;
use plugmenu_plugin::dispatch::DispatchOutcome;
use plugmenu_plugin::{
    ContextMenuHandle, ContextMenuService, DispatchBridge, HostEventBus, StdioChannel,
};

const WORKER: &str = env!("CARGO_BIN_EXE_plugmenu-worker");

struct Host {
    handle: ContextMenuHandle,
    bus: Arc<HostEventBus>,
    bridge: Arc<DispatchBridge>,
}

async fn host(timeout_ms: u64) -> Host {
    let mut config = AppConfig::default();
    config.dispatch.timeout_ms = timeout_ms;

    let bus = Arc::new(HostEventBus::new(config.ingress.buffer_size));
    let bridge = Arc::new(DispatchBridge::new(&config.dispatch));
    let (handle, _task) =
        ContextMenuService::start(&config, Arc::clone(&bus), Arc::clone(&bridge));
    handle.subscribe_events().await.unwrap();
    Host {
        handle,
        bus,
        bridge,
    }
}

fn worker(id: &str, extra_env: &[(&str, &str)]) -> PluginProcessConfig {
    let menus = json!([
        {"context": "server-row", "items": [
            {"id": "restart", "label": "Restart"},
            {"id": "snapshot", "label": "Snapshot", "icon": "camera"}
        ]},
        {"context": "global", "items": [{"id": "about", "label": "About"}]}
    ]);
    let mut config = PluginProcessConfig::new(id, WORKER)
        .with_env("PLUGMENU_WORKER_MENUS", menus.to_string())
        .with_env("RUST_LOG", "warn");
    for (name, value) in extra_env {
        config = config.with_env(*name, *value);
    }
    config
}

async fn start_worker(host: &Host, config: &PluginProcessConfig) -> Arc<StdioChannel> {
    let channel = StdioChannel::spawn(config, Arc::clone(&host.bus)).unwrap();
    host.bridge.add_route(channel.clone()).await;
    wait_for_items(&host.handle, "server-row", 3).await;
    channel
}

async fn wait_for_items(handle: &ContextMenuHandle, context: &str, count: usize) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while handle.compose(context).await.unwrap().len() != count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("worker registrations did not arrive");
}

#[tokio::test]
async fn worker_registrations_and_selection_round_trip() {
    let host = host(5000).await;
    let mut selected = host.bus.subscribe("context-menu-selected").await;
    let channel = start_worker(&host, &worker("backup", &[])).await;

    let ids: Vec<String> = host
        .handle
        .compose("server-row")
        .await
        .unwrap()
        .into_iter()
        .map(|item| item.id)
        .collect();
    assert_eq!(ids, vec!["restart", "snapshot", "about"]);

    host.handle
        .open("server-row", MenuPosition::new(4.0, 8.0), "srv-42")
        .await
        .unwrap()
        .unwrap();
    let outcome = host.handle.select_item("snapshot").await.unwrap().unwrap();
    assert!(outcome.is_delivered(), "unexpected outcome: {outcome}");
    assert!(!host.handle.state().await.unwrap().visible);

    let echoed = tokio::time::timeout(Duration::from_secs(5), selected.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        echoed,
        json!({
            "pluginId": "backup",
            "context": "server-row",
            "itemId": "snapshot",
            "targetData": "srv-42",
        })
    );

    channel.shutdown("test done", Duration::from_secs(5)).await;
}

#[tokio::test]
async fn worker_failure_is_reported_as_plugin_error() {
    let host = host(5000).await;
    let channel = start_worker(
        &host,
        &worker("flaky", &[("PLUGMENU_WORKER_FAIL", "snapshot store offline")]),
    )
    .await;

    host.handle
        .open("server-row", MenuPosition::default(), "srv-1")
        .await
        .unwrap();
    let outcome = host.handle.select_item("restart").await.unwrap().unwrap();

    assert!(matches!(
        outcome,
        DispatchOutcome::PluginError { ref message, .. } if message == "snapshot store offline"
    ));
    assert!(!host.handle.state().await.unwrap().visible);

    channel.shutdown("test done", Duration::from_secs(5)).await;
}

#[tokio::test]
async fn slow_worker_times_out() {
    let host = host(100).await;
    let channel = start_worker(
        &host,
        &worker("sleepy", &[("PLUGMENU_WORKER_DELAY_MS", "1500")]),
    )
    .await;

    host.handle
        .open("server-row", MenuPosition::default(), "srv-1")
        .await
        .unwrap();
    let outcome = host.handle.select_item("restart").await.unwrap().unwrap();

    assert!(matches!(outcome, DispatchOutcome::TimedOut { timeout_ms: 100, .. }));
    assert!(!host.handle.state().await.unwrap().visible);
    assert_eq!(channel.pending_count(), 0);

    channel.shutdown("test done", Duration::from_secs(5)).await;
}

#[tokio::test]
async fn cleanup_after_worker_exit_purges_menus() {
    let host = host(5000).await;
    let channel = start_worker(&host, &worker("ephemeral", &[])).await;

    host.handle
        .open("server-row", MenuPosition::default(), "srv-1")
        .await
        .unwrap();
    let stale = host.handle.state().await.unwrap().items.remove(0);

    channel.shutdown("unload", Duration::from_secs(5)).await;
    assert!(channel.is_closed());

    let report = host.handle.cleanup_plugin("ephemeral").await.unwrap();
    assert!(report.route_removed);
    assert!(host.handle.compose("server-row").await.unwrap().is_empty());

    let outcome = host.handle.select(stale).await.unwrap().unwrap();
    assert!(matches!(outcome, DispatchOutcome::PluginError { .. }));
}
