//! Core type definitions used across the plugmenu workspace.

pub mod id;
pub mod menu;

pub use id::RequestId;
pub use menu::{MenuItem, MenuItemSpec, MenuPosition};
