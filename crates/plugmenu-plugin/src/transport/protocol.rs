//! Line-delimited JSON protocol spoken with plugin worker processes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One protocol line, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireMessage {
    /// Host → worker: run a command.
    Invoke {
        request_id: String,
        command: String,
        args: Value,
    },
    /// Worker → host: result of an `invoke`.
    InvokeResult {
        request_id: String,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Worker → host: publish a host event.
    Emit { event: String, payload: Value },
    /// Host → worker: the host stopped waiting for a request.
    Cancel { request_id: String, reason: String },
    /// Host → worker: exit.
    Shutdown { reason: String },
}

impl WireMessage {
    /// Encodes the message as one line, newline included.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Decodes one line, ignoring surrounding whitespace.
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }
}
