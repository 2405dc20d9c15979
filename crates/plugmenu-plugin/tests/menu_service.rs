//! End-to-end behavior of the context menu service with in-process plugins.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::sync::{Notify, mpsc};

use plugmenu_core::config::AppConfig;
use plugmenu_core::events::{CallbackArgs, MenuEvent, PLUGIN_CONTEXT_MENU_EVENT};
use plugmenu_core::types::{MenuItemSpec, MenuPosition};
use plugmenu_plugin::dispatch::{ClosureCallback, DispatchOutcome, InProcessChannel};
use plugmenu_plugin::ingress::IngressOutcome;
use plugmenu_plugin::registry::GLOBAL_CONTEXT;
use plugmenu_plugin::{ContextMenuHandle, ContextMenuService, DispatchBridge, HostEventBus};

struct Harness {
    handle: ContextMenuHandle,
    bus: Arc<HostEventBus>,
    bridge: Arc<DispatchBridge>,
}

fn harness(timeout_ms: u64) -> Harness {
    let mut config = AppConfig::default();
    config.dispatch.timeout_ms = timeout_ms;

    let bus = Arc::new(HostEventBus::new(config.ingress.buffer_size));
    let bridge = Arc::new(DispatchBridge::new(&config.dispatch));
    let (handle, _task) =
        ContextMenuService::start(&config, Arc::clone(&bus), Arc::clone(&bridge));
    Harness {
        handle,
        bus,
        bridge,
    }
}

fn specs(ids: &[&str]) -> Vec<MenuItemSpec> {
    ids.iter().map(|id| MenuItemSpec::new(*id, id.to_uppercase())).collect()
}

async fn register(handle: &ContextMenuHandle, plugin: &str, context: &str, ids: &[&str]) {
    handle
        .apply(&MenuEvent::register(plugin, context, specs(ids)))
        .await
        .unwrap();
}

async fn composed(handle: &ContextMenuHandle, context: &str) -> Vec<String> {
    handle
        .compose(context)
        .await
        .unwrap()
        .into_iter()
        .map(|item| item.id)
        .collect()
}

/// Routes `plugin_id` to a handler that records its calls and replies with `result`.
async fn route_recording(
    bridge: &DispatchBridge,
    plugin_id: &str,
    result: Result<(), String>,
) -> Arc<Mutex<Vec<CallbackArgs>>> {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&calls);
    bridge
        .add_route(InProcessChannel::wrap(Arc::new(ClosureCallback::new(
            plugin_id,
            move |args| {
                recorded.lock().unwrap().push(args);
                let result = result.clone();
                async move { result }
            },
        ))))
        .await;
    calls
}

/// A plugin whose callback blocks until released.
struct Gate {
    entered: mpsc::UnboundedReceiver<()>,
    release: Arc<Notify>,
}

async fn route_gated(bridge: &DispatchBridge, plugin_id: &str) -> Gate {
    let (entered_tx, entered) = mpsc::unbounded_channel();
    let release = Arc::new(Notify::new());
    let gate = Arc::clone(&release);
    bridge
        .add_route(InProcessChannel::wrap(Arc::new(ClosureCallback::new(
            plugin_id,
            move |_| {
                let entered_tx = entered_tx.clone();
                let gate = Arc::clone(&gate);
                async move {
                    let _ = entered_tx.send(());
                    gate.notified().await;
                    Ok(())
                }
            },
        ))))
        .await;
    Gate { entered, release }
}

#[tokio::test]
async fn server_row_scenario() {
    let h = harness(1000);
    register(&h.handle, "A", "server-row", &["a1", "a2"]).await;
    register(&h.handle, "A", GLOBAL_CONTEXT, &["g1"]).await;
    register(&h.handle, "B", "server-row", &["b1"]).await;

    assert_eq!(
        composed(&h.handle, "server-row").await,
        vec!["a1", "a2", "b1", "g1"]
    );

    let report = h.handle.cleanup_plugin("A").await.unwrap();
    assert_eq!(report.contexts, vec!["global", "server-row"]);

    assert_eq!(composed(&h.handle, "server-row").await, vec!["b1"]);
    assert!(composed(&h.handle, GLOBAL_CONTEXT).await.is_empty());
}

#[tokio::test]
async fn registration_replaces_and_empty_registration_removes() {
    let h = harness(1000);
    register(&h.handle, "A", "ctx", &["a1", "a2"]).await;
    register(&h.handle, "A", "ctx", &["a3"]).await;
    assert_eq!(composed(&h.handle, "ctx").await, vec!["a3"]);

    let outcome = h
        .handle
        .apply(&MenuEvent::register("A", "ctx", Vec::new()))
        .await
        .unwrap();
    assert_eq!(outcome, IngressOutcome::Unregistered);
    assert!(!h.handle.has_menu_items("ctx").await.unwrap());
}

#[tokio::test]
async fn open_with_nothing_to_show_stays_hidden() {
    let h = harness(1000);
    let opened = h
        .handle
        .open("server-row", MenuPosition::new(1.0, 2.0), "srv-1")
        .await
        .unwrap();

    assert!(opened.is_none());
    assert!(!h.handle.state().await.unwrap().visible);
}

#[tokio::test]
async fn select_delivers_callback_and_closes_menu() {
    let h = harness(1000);
    let calls = route_recording(&h.bridge, "A", Ok(())).await;
    register(&h.handle, "A", "server-row", &["a1"]).await;
    h.handle
        .open("server-row", MenuPosition::new(10.0, 20.0), "srv-1")
        .await
        .unwrap();

    let outcome = h.handle.select_item("a1").await.unwrap().unwrap();
    assert!(outcome.is_delivered());
    assert!(!h.handle.state().await.unwrap().visible);

    let calls = calls.lock().unwrap();
    assert_eq!(
        calls.as_slice(),
        &[CallbackArgs {
            plugin_id: "A".to_string(),
            context: "server-row".to_string(),
            item_id: "a1".to_string(),
            target_data: "srv-1".to_string(),
        }]
    );
}

#[tokio::test]
async fn select_closes_menu_on_plugin_error() {
    let h = harness(1000);
    route_recording(&h.bridge, "A", Err("backup offline".to_string())).await;
    register(&h.handle, "A", "ctx", &["a1"]).await;
    h.handle
        .open("ctx", MenuPosition::default(), "row")
        .await
        .unwrap();

    let outcome = h.handle.select_item("a1").await.unwrap().unwrap();
    assert!(matches!(
        outcome,
        DispatchOutcome::PluginError { ref message, .. } if message == "backup offline"
    ));
    assert!(!h.handle.state().await.unwrap().visible);
}

#[tokio::test]
async fn select_closes_menu_on_timeout() {
    let h = harness(50);
    h.bridge
        .add_route(InProcessChannel::wrap(Arc::new(ClosureCallback::new(
            "slow",
            |_| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            },
        ))))
        .await;
    register(&h.handle, "slow", "ctx", &["s1"]).await;
    h.handle
        .open("ctx", MenuPosition::default(), "")
        .await
        .unwrap();

    let outcome = h.handle.select_item("s1").await.unwrap().unwrap();
    assert!(matches!(outcome, DispatchOutcome::TimedOut { timeout_ms: 50, .. }));
    assert!(!h.handle.state().await.unwrap().visible);
}

#[tokio::test]
async fn select_after_cleanup_fails_fast() {
    let h = harness(1000);
    let calls = route_recording(&h.bridge, "A", Ok(())).await;
    register(&h.handle, "A", "ctx", &["a1"]).await;
    h.handle
        .open("ctx", MenuPosition::default(), "")
        .await
        .unwrap();
    let item = h.handle.state().await.unwrap().items.remove(0);

    h.handle.cleanup_plugin("A").await.unwrap();
    let outcome = h.handle.select(item).await.unwrap().unwrap();

    assert!(matches!(outcome, DispatchOutcome::PluginError { .. }));
    assert!(calls.lock().unwrap().is_empty());
    assert!(!h.handle.state().await.unwrap().visible);
}

#[tokio::test]
async fn menu_stays_open_while_dispatch_is_pending() {
    let h = harness(5000);
    let mut gate = route_gated(&h.bridge, "gate").await;
    register(&h.handle, "gate", "ctx", &["go"]).await;
    h.handle
        .open("ctx", MenuPosition::default(), "")
        .await
        .unwrap();

    let handle = h.handle.clone();
    let pending = tokio::spawn(async move { handle.select_item("go").await });
    gate.entered.recv().await.unwrap();

    // The service keeps serving while the callback is in flight.
    register(&h.handle, "other", "ctx", &["o1"]).await;
    assert!(h.handle.state().await.unwrap().visible);

    gate.release.notify_one();
    let outcome = pending.await.unwrap().unwrap().unwrap();
    assert!(outcome.is_delivered());
    assert!(!h.handle.state().await.unwrap().visible);
}

#[tokio::test]
async fn finished_dispatch_closes_menu_opened_meanwhile() {
    let h = harness(5000);
    let mut gate = route_gated(&h.bridge, "gate").await;
    register(&h.handle, "gate", "ctx", &["go"]).await;
    h.handle
        .open("ctx", MenuPosition::default(), "first")
        .await
        .unwrap();

    let handle = h.handle.clone();
    let pending = tokio::spawn(async move { handle.select_item("go").await });
    gate.entered.recv().await.unwrap();

    h.handle
        .open("ctx", MenuPosition::default(), "second")
        .await
        .unwrap();
    assert_eq!(h.handle.state().await.unwrap().target_data, "second");

    gate.release.notify_one();
    let outcome = pending.await.unwrap().unwrap().unwrap();
    assert!(outcome.is_delivered());

    let state = h.handle.state().await.unwrap();
    assert!(!state.visible);
    assert!(state.items.is_empty());
}

#[tokio::test]
async fn empty_open_keeps_the_visible_menu() {
    let h = harness(1000);
    register(&h.handle, "A", "server-row", &["a1"]).await;
    h.handle
        .open("server-row", MenuPosition::new(3.0, 4.0), "srv-1")
        .await
        .unwrap();
    let before = h.handle.state().await.unwrap();

    let opened = h
        .handle
        .open("player-row", MenuPosition::new(9.0, 9.0), "p-1")
        .await
        .unwrap();

    assert!(opened.is_none());
    assert_eq!(h.handle.state().await.unwrap(), before);
}

#[tokio::test]
async fn open_menu_keeps_items_composed_at_open() {
    let h = harness(1000);
    register(&h.handle, "A", "server-row", &["a1", "a2"]).await;
    register(&h.handle, "B", "server-row", &["b1"]).await;
    register(&h.handle, "G", GLOBAL_CONTEXT, &["g1"]).await;
    h.handle
        .open("server-row", MenuPosition::default(), "srv-1")
        .await
        .unwrap();
    let at_open = h.handle.state().await.unwrap().items;
    assert_eq!(
        at_open.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
        vec!["a1", "a2", "b1", "g1"]
    );

    register(&h.handle, "C", "server-row", &["c1"]).await;
    register(&h.handle, "A", "server-row", &["a9"]).await;
    register(&h.handle, "G", GLOBAL_CONTEXT, &["g2"]).await;
    register(&h.handle, "H", GLOBAL_CONTEXT, &["h1"]).await;
    h.handle.cleanup_plugin("B").await.unwrap();

    let state = h.handle.state().await.unwrap();
    assert!(state.visible);
    assert_eq!(state.items, at_open);
    assert_eq!(
        composed(&h.handle, "server-row").await,
        vec!["a9", "c1", "g2", "h1"]
    );
}

#[tokio::test]
async fn bus_events_reach_the_registry_after_subscribe() {
    let h = harness(1000);
    assert!(h.handle.subscribe_events().await.unwrap());
    assert!(!h.handle.subscribe_events().await.unwrap());

    h.bus
        .publish(
            PLUGIN_CONTEXT_MENU_EVENT,
            MenuEvent::register("A", "ctx", specs(&["a1"])).to_value(),
        )
        .await;
    h.bus
        .publish(PLUGIN_CONTEXT_MENU_EVENT, json!({"action": "register", "context": "ctx"}))
        .await;

    tokio::time::timeout(Duration::from_secs(5), async {
        while h.handle.ingress_stats().await.unwrap().dropped == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    assert!(h.handle.has_menu_items("ctx").await.unwrap());
    let stats = h.handle.ingress_stats().await.unwrap();
    assert_eq!((stats.applied, stats.dropped), (1, 1));

    assert!(h.handle.teardown_events().await.unwrap());
    assert!(!h.handle.teardown_events().await.unwrap());
    assert_eq!(h.bus.subscriber_count(PLUGIN_CONTEXT_MENU_EVENT).await, 0);
}
