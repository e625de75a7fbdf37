//! Logging initialization: console output plus daily-rolling app and
//! audit files.
//!
//! Application logs go to the console and to `app.<date>.log`; audit
//! events (everything on the `steward::audit` target) are routed
//! exclusively to `audit.<date>.log` so the audit trail stays separate
//! from operational noise. `RUST_LOG` overrides the configured level.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    Layer, filter::EnvFilter, filter::filter_fn, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::config::LoggingConfig;
use crate::security::AUDIT_TARGET;

/// Keeps the non-blocking writer threads alive for the process lifetime.
pub struct LogGuards {
    _app: WorkerGuard,
    _audit: WorkerGuard,
}

/// Install the global subscriber.
///
/// Returns guards that must be held until shutdown; dropping them flushes
/// and stops the background writers.
pub fn init(config: &LoggingConfig) -> anyhow::Result<LogGuards> {
    std::fs::create_dir_all(&config.log_dir)?;

    let app_file = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("app")
        .filename_suffix("log")
        .max_log_files(config.max_files.max(1))
        .build(&config.log_dir)?;
    let audit_file = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("audit")
        .filename_suffix("log")
        .max_log_files(config.max_files.max(1))
        .build(&config.log_dir)?;

    let (app_writer, app_guard) = tracing_appender::non_blocking(app_file);
    let (audit_writer, audit_guard) = tracing_appender::non_blocking(audit_file);

    // Audit events must pass the filter regardless of the app level.
    let env_filter = std::env::var("RUST_LOG")
        .map(|v| EnvFilter::new(format!("{v},{AUDIT_TARGET}=info")))
        .unwrap_or_else(|_| EnvFilter::new(format!("{},{AUDIT_TARGET}=info", config.level)));

    let console_layer = fmt::layer()
        .with_target(false)
        .compact()
        .with_filter(filter_fn(|meta| meta.target() != AUDIT_TARGET));

    let app_layer = fmt::layer()
        .with_writer(app_writer)
        .with_ansi(false)
        .with_filter(filter_fn(|meta| meta.target() != AUDIT_TARGET));

    let audit_layer = fmt::layer()
        .with_writer(audit_writer)
        .with_ansi(false)
        .with_target(false)
        .with_filter(filter_fn(|meta| meta.target() == AUDIT_TARGET));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(app_layer)
        .with(audit_layer)
        .init();

    Ok(LogGuards {
        _app: app_guard,
        _audit: audit_guard,
    })
}
