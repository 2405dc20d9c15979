//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section, and every field carries a serde default so an empty file is
//! a valid configuration.

pub mod dispatch;
pub mod ingress;
pub mod logging;
pub mod plugin;
pub mod service;

use serde::{Deserialize, Serialize};

pub use self::dispatch::DispatchConfig;
pub use self::ingress::IngressConfig;
pub use self::logging::LoggingConfig;
pub use self::plugin::{EnvVar, PluginProcessConfig};
pub use self::service::ServiceConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// Top-level deserialization target for the merged TOML configuration
/// (base file + environment overlay + `PLUGMENU__*` variables).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Host event subscription settings.
    #[serde(default)]
    pub ingress: IngressConfig,
    /// Plugin callback dispatch settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Menu service settings.
    #[serde(default)]
    pub service: ServiceConfig,
    /// Plugin worker processes spawned by the host.
    #[serde(default)]
    pub plugins: Vec<PluginProcessConfig>,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Reads `path` (optional), then `config/{env}` (optional), then
    /// environment variables prefixed with `PLUGMENU__`.
    pub fn load(path: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("PLUGMENU")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }

    /// Parse configuration from an in-memory TOML document.
    pub fn from_toml(source: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Validates cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), AppError> {
        let mut seen = std::collections::HashSet::new();
        for plugin in &self.plugins {
            if plugin.id.trim().is_empty() {
                return Err(AppError::configuration("plugin id is required"));
            }
            if plugin.command.trim().is_empty() {
                return Err(AppError::configuration(format!(
                    "plugin '{}' has an empty command",
                    plugin.id
                )));
            }
            if !seen.insert(plugin.id.as_str()) {
                return Err(AppError::configuration(format!(
                    "plugin '{}' is configured more than once",
                    plugin.id
                )));
            }
        }
        if self.ingress.event_name.trim().is_empty() {
            return Err(AppError::configuration("ingress.event_name is required"));
        }
        Ok(())
    }
}
