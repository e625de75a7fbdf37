pub use components::{LogLevel, LoggingConfig, PluginConfig, SecurityConfig, ServerConfig, SnapshotConfig};
use serde::{Deserialize, Serialize};
/**
 * Steward configuration root module.
 *
 * - Defines the root configuration struct (`StewardConfig`) and its defaults.
 * - Provides config file loading, CLI/env override logic, and error reporting.
 * - Uses `components.rs` for types/enums and `defaults.rs` for default helpers.
 */
use std::{collections::HashMap, path::Path, path::PathBuf};
use thiserror::Error;

pub mod components;
pub mod defaults;

// Root configuration for the Steward daemon.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StewardConfig {
    /// HTTP/WebSocket bind configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging sinks and rotation.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Allowlist, admission and audit settings.
    #[serde(default)]
    pub security: SecurityConfig,

    /// Snapshot store location.
    #[serde(default)]
    pub snapshots: SnapshotConfig,

    /// Per-plugin enablement and opaque options, keyed by plugin name.
    #[serde(default)]
    pub plugins: HashMap<String, PluginConfig>,
}

impl StewardConfig {
    /// Compute the default configuration file path.
    pub fn default_path() -> PathBuf {
        // Allow override via environment variable
        if let Some(override_path) = std::env::var_os("STEWARD_CONFIG_PATH") {
            return PathBuf::from(override_path);
        }
        PathBuf::from("/")
            .join("etc")
            .join("steward")
            .join("config.yaml")
    }

    /// Load config from file and apply CLI overrides.
    ///
    /// Loads configuration from a YAML file if it exists, otherwise uses
    /// defaults. Then applies command-line overrides with highest
    /// precedence, and validates the result.
    ///
    /// # Arguments
    /// * `config_path` - Optional path to the configuration file. Uses default if None.
    /// * `host` - Optional bind host override.
    /// * `port` - Optional bind port override.
    /// * `log_level` - Optional log level override.
    ///
    /// # Returns
    /// The loaded, overridden and validated configuration, or a ConfigError.
    pub fn load_with_overrides(
        config_path: Option<PathBuf>,
        host: Option<String>,
        port: Option<u16>,
        log_level: Option<LogLevel>,
    ) -> Result<Self, ConfigError> {
        let path = config_path.unwrap_or_else(Self::default_path);

        let mut cfg = if path.exists() {
            tracing::debug!("Reading from configuration file {:?}", path);
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::Parse(path.clone(), format!("I/O error: {}", e)))?;
            Self::parse_yaml_with_path(&path, &text)?
        } else {
            tracing::warn!(
                "No configuration file (checked {:?}) initializing with defaults",
                path
            );
            Self::default()
        };

        // Apply CLI/env overrides (highest precedence)
        if let Some(host) = host {
            cfg.server.host = host;
        }
        if let Some(port) = port {
            cfg.server.port = port;
        }
        if let Some(level) = log_level {
            cfg.logging.level = level;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse YAML configuration with enhanced error reporting.
    ///
    /// Uses serde_yaml_ng to parse the YAML text, and includes line/column
    /// information in error messages for better debugging.
    fn parse_yaml_with_path(path: &Path, text: &str) -> Result<Self, ConfigError> {
        serde_yaml_ng::from_str::<Self>(text).map_err(|e| {
            let msg = if let Some(loc) = e.location() {
                format!(
                    "yaml error at line {}, column {}: {}",
                    loc.line(),
                    loc.column(),
                    e
                )
            } else {
                format!("yaml error: {}", e)
            };

            ConfigError::Parse(path.to_path_buf(), msg)
        })
    }

    /// Reject configurations outside the documented bounds.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid(
                "server.port must be in 1..65535".to_string(),
            ));
        }
        if self.security.max_concurrent_operations < 1 {
            return Err(ConfigError::Invalid(
                "security.maxConcurrentOperations must be >= 1".to_string(),
            ));
        }
        if self.security.command_timeout < 1000 {
            return Err(ConfigError::Invalid(
                "security.commandTimeout must be >= 1000 ms".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether a plugin is enabled. Plugins absent from the config are
    /// disabled; the built-in plugin is the fallback when nothing is
    /// enabled.
    pub fn plugin_enabled(&self, name: &str) -> bool {
        self.plugins.get(name).map(|p| p.enabled).unwrap_or(false)
    }

    /// Bind address in `host:port` form.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

// Errors during configuration loading/parsing.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse configuration content.
    ///
    /// Tuple fields:
    /// - 0: Path to the configuration file that failed to parse
    /// - 1: Error message from the underlying parser
    #[error("Failed to parse {0}: {1}")]
    Parse(PathBuf, String),

    /// Configuration value outside its documented bounds.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
