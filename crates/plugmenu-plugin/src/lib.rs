//! # plugmenu-plugin
//!
//! Plugin-extensible context menus. Provides:
//!
//! - Menu registry keyed by context and plugin, with a global fallback
//! - Menu composition and the single open menu session
//! - Event ingress for `plugin-context-menu` register/unregister events
//! - Dispatch of `context_menu_callback` with correlation ids and timeouts
//! - Plugin workers driven over line-delimited JSON on stdio
//! - Unload cleanup and the service task that owns all menu state

pub mod bus;
pub mod composer;
pub mod dispatch;
pub mod ingress;
pub mod lifecycle;
pub mod manager;
pub mod prelude;
pub mod registry;
pub mod session;
pub mod transport;

pub use bus::HostEventBus;
pub use composer::MenuComposer;
pub use dispatch::{DispatchBridge, DispatchOutcome};
pub use ingress::EventIngress;
pub use lifecycle::PluginLifecycleHook;
pub use manager::{ContextMenuHandle, ContextMenuService};
pub use registry::MenuRegistry;
pub use session::{MenuSession, MenuState};
pub use transport::StdioChannel;
