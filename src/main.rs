//! Steward daemon entry point.
//!
//! This module contains the main entry point for the Steward MCP (Model
//! Context Protocol) control-plane daemon. It handles command-line
//! argument parsing, configuration loading, plugin registration, and
//! server startup.
//!
//! # Responsibilities
//!
//! - Parse CLI arguments and environment variables (via Clap)
//! - Load configuration from file, environment, and CLI overrides
//! - Initialize logging and application state
//! - Register configured plugins
//! - Start the HTTP/WebSocket server
//!
//! # Application Lifecycle
//!
//! The daemon follows a structured initialization sequence:
//! 1. **Unknown** → Parse CLI args and initialize state
//! 2. **Initializing** → Load configuration and build the component graph
//! 3. **LoadingPlugins** → Register configured plugins and their tools
//! 4. **StartingNetwork** → Bind the listener
//! 5. **Ready** → Serving requests
//! 6. **Terminating** → Shutdown: kill children, run plugin cleanup

use clap::Parser;
use steward::{
    config::{LogLevel, StewardConfig},
    logging, plugins,
    server::service::start,
    state::{ApplicationState, StewardState},
};

/// CLI arguments definition for the Steward daemon.
///
/// This struct defines all command-line arguments and environment
/// variables supported by the daemon. Field documentation is used by Clap
/// to generate help text, so keep them in rustdoc format.
#[derive(Parser, Debug, Clone)]
#[command(name = "steward", version, about = "Steward MCP control-plane daemon", long_about = None)]
struct Args {
    /// Config file path (overrides default path and STEWARD_CONFIG_PATH)
    #[arg(long = "config-file", value_name = "FILE", env = "STEWARD_CONFIG_PATH")]
    config_file: Option<std::path::PathBuf>,

    /// Bind host override (optional)
    #[arg(long = "host", value_name = "HOST", env = "STEWARD_HOST")]
    host: Option<String>,

    /// Bind port override (optional)
    #[arg(long = "port", value_name = "PORT", env = "STEWARD_PORT")]
    port: Option<u16>,

    /// Log level override (optional)
    #[arg(
        long = "log-level",
        value_name = "LEVEL",
        env = "STEWARD_LOG_LEVEL",
        value_enum
    )]
    log_level: Option<LogLevel>,
}

/// Main entry point for the Steward daemon.
///
/// Orchestrates the complete initialization sequence: argument parsing,
/// configuration loading, state construction, plugin registration, and
/// server startup.
///
/// # Returns
/// - `Ok(())` if the daemon starts and shuts down cleanly
/// - `Err(anyhow::Error)` if initialization or execution fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration from file, environment, and CLI overrides
    let config = StewardConfig::load_with_overrides(
        args.config_file.clone(),
        args.host.clone(),
        args.port,
        args.log_level,
    )?;

    // Initialize logging; the guards keep the file writers alive
    let _log_guards = logging::init(&config.logging)?;

    // Build the component graph
    let state = StewardState::from_config(&config).await?;
    state.set_state(ApplicationState::Initializing);
    tracing::debug!("Early init completed");

    // Register configured plugins and their tools
    state.set_state(ApplicationState::LoadingPlugins);
    plugins::load_plugins(&config, state.clone()).await?;
    tracing::debug!("Plugin load completed");

    // Bind and serve
    state.set_state(ApplicationState::StartingNetwork);
    match start(&config, state).await {
        Ok(_) => tracing::debug!("Server has exited"),
        Err(e) => tracing::error!("Server execution failed: {:?}", e),
    }

    Ok(())
}
