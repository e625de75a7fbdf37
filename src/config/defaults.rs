/// Steward configuration defaults module.
///
/// This module provides default value helpers for serde deserialization
/// in config structs. These functions ensure consistent defaulting across
/// `components.rs` and `mod.rs`, and handle cases where entire config
/// blocks are missing from the configuration file.
use std::path::PathBuf;

use super::components::LogLevel;

/// Default bind host.
pub(crate) fn default_host() -> String {
    "localhost".to_string()
}

/// Default bind port.
pub(crate) fn default_port() -> u16 {
    8080
}

/// Default log level.
pub(crate) fn default_log_level() -> LogLevel {
    LogLevel::Info
}

/// Default log directory.
pub(crate) fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

/// Default number of rotated log files retained.
pub(crate) fn default_log_max_files() -> usize {
    14
}

/// Default size bound per log file (10 MiB).
pub(crate) fn default_log_max_size() -> u64 {
    10 * 1024 * 1024
}

/// Default admission semaphore capacity.
pub(crate) fn default_max_concurrent() -> usize {
    10
}

/// Default command deadline in milliseconds.
pub(crate) fn default_command_timeout() -> u64 {
    30_000
}

/// Default snapshot directory.
pub(crate) fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("snapshots")
}

/// Default true value.
pub(crate) fn default_true() -> bool {
    true
}

/// Default false value.
pub(crate) fn default_false() -> bool {
    false
}
