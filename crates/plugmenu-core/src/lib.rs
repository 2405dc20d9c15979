//! # plugmenu-core
//!
//! Core crate for plugmenu. Contains the unified error system,
//! configuration schemas, the wire shapes of host events and plugin
//! callbacks, and the menu domain types shared by the other crates.
//!
//! This crate has **no** internal dependencies on other plugmenu crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
