//! Prelude for in-process plugins and host wiring.

pub use async_trait::async_trait;

pub use plugmenu_core::events::{CallbackArgs, MenuEvent};
pub use plugmenu_core::types::{MenuItem, MenuItemSpec, MenuPosition};

pub use crate::bus::HostEventBus;
pub use crate::dispatch::{
    CallbackHandler, ClosureCallback, CommandChannel, DispatchBridge, DispatchOutcome,
    InProcessChannel,
};
pub use crate::manager::{ContextMenuHandle, ContextMenuService};
pub use crate::registry::GLOBAL_CONTEXT;
