/// Steward configuration components module.
///
/// This module defines user-facing configuration structures and enums for
/// the Steward daemon. It provides the building blocks for the root
/// `StewardConfig` in `mod.rs`; default helpers live in `defaults.rs`.
use std::{collections::HashMap, path::PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::defaults;

/// Logging levels supported by Steward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Error-level logging only.
    Error,
    /// Warning-level logging.
    Warn,
    /// Info-level logging (default).
    Info,
    /// Debug-level logging (verbose).
    Debug,
}

/// Display implementation for LogLevel.
///
/// Formats the log level as a lowercase string.
impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        write!(f, "{}", s)
    }
}

/// Bind address and port for the HTTP/WebSocket surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default "localhost").
    #[serde(default = "defaults::default_host")]
    pub host: String,
    /// Port to bind, 1..65535 (default 8080).
    #[serde(default = "defaults::default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::default_host(),
            port: defaults::default_port(),
        }
    }
}

/// Logging sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// Minimum level written to the sinks.
    #[serde(default = "defaults::default_log_level")]
    pub level: LogLevel,
    /// Directory receiving the rotating app and audit log files.
    #[serde(default = "defaults::default_log_dir")]
    pub log_dir: PathBuf,
    /// Rotated files retained per log stream.
    #[serde(default = "defaults::default_log_max_files")]
    pub max_files: usize,
    /// Size bound per log file, in bytes.
    #[serde(default = "defaults::default_log_max_size")]
    pub max_size: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::default_log_level(),
            log_dir: defaults::default_log_dir(),
            max_files: defaults::default_log_max_files(),
            max_size: defaults::default_log_max_size(),
        }
    }
}

/// Admission, allowlist and audit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityConfig {
    /// Reserved admission gate; currently gates nothing beyond audit.
    #[serde(default = "defaults::default_false")]
    pub require_auth: bool,
    /// Bare command names the executor may spawn. Empty imposes no
    /// allowlist restriction.
    #[serde(default)]
    pub allowed_commands: Vec<String>,
    /// Admission semaphore capacity (>= 1).
    #[serde(default = "defaults::default_max_concurrent")]
    pub max_concurrent_operations: usize,
    /// Default child-process deadline in milliseconds (>= 1000).
    #[serde(default = "defaults::default_command_timeout")]
    pub command_timeout: u64,
    /// Whether audit events are written to the audit sink.
    #[serde(default = "defaults::default_true")]
    pub audit_all: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            require_auth: defaults::default_false(),
            allowed_commands: Vec::new(),
            max_concurrent_operations: defaults::default_max_concurrent(),
            command_timeout: defaults::default_command_timeout(),
            audit_all: defaults::default_true(),
        }
    }
}

/// Snapshot store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Directory holding `<uuid>.json` records.
    #[serde(default = "defaults::default_snapshot_dir")]
    pub dir: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            dir: defaults::default_snapshot_dir(),
        }
    }
}

/// Per-plugin enablement plus opaque plugin-specific options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Whether the plugin is registered at startup.
    #[serde(default = "defaults::default_true")]
    pub enabled: bool,
    /// Plugin-specific sub-options, passed through opaquely.
    #[serde(flatten)]
    pub options: HashMap<String, serde_yaml_ng::Value>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::default_true(),
            options: HashMap::new(),
        }
    }
}
