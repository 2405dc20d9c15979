//! Process boundary: plugin workers driven over stdio.

pub mod protocol;
pub mod stdio;

pub use protocol::WireMessage;
pub use stdio::StdioChannel;

/// Environment variable carrying the plugin id into a worker process.
pub const PLUGIN_ID_ENV: &str = "PLUGMENU_PLUGIN_ID";
