//! Plugin worker process configuration.

use serde::{Deserialize, Serialize};

/// A plugin hosted in a separate worker process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginProcessConfig {
    /// Stable plugin identifier.
    pub id: String,
    /// Executable to spawn.
    pub command: String,
    /// Arguments passed to the executable.
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables for the worker.
    #[serde(default)]
    pub env: Vec<EnvVar>,
}

/// One environment variable. Kept as a list entry so the name keeps its case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    /// Variable name.
    pub name: String,
    /// Variable value.
    pub value: String,
}

impl PluginProcessConfig {
    /// Creates a worker configuration without extra arguments.
    pub fn new(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Adds an environment variable, replacing an earlier one of the same name.
    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.env.retain(|var| var.name != name);
        self.env.push(EnvVar {
            name,
            value: value.into(),
        });
        self
    }

    /// Iterates `(name, value)` pairs.
    pub fn env_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.env.iter().map(|var| (var.name.as_str(), var.value.as_str()))
    }
}
