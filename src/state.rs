/// The application state is responsible for:
///
/// - Maintaining the lifecycle state of the daemon
/// - Hosting the MCP session, plugin registry, security kernel,
///   command executor and snapshot store
use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};

use tracing::debug;

use crate::{
    config::StewardConfig,
    errors::StewardError,
    exec::CommandExecutor,
    plugins::registry::PluginRegistry,
    protocol::{ClientInfo, Session},
    security::{AuditLog, SecurityKernel, SnapshotStore, snapshot::NullServiceState},
};

/** Application lifecycle states. */
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ApplicationState {
    /// Unknown state, typically the initial state.
    Unknown = 0,
    /// The application is initializing.
    Initializing = 1,
    /// Loading plugins.
    LoadingPlugins = 2,
    /// Starting network services.
    StartingNetwork = 3,
    /// The application is ready to serve requests.
    Ready = 4,
    /// The application is terminating.
    Terminating = 5,
}

/// Server identity advertised during the MCP handshake.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// Shared application state.
//
// This struct holds the core state of the Steward daemon: server identity,
// lifecycle state, the single MCP session, and the component instances the
// protocol machine dispatches into.
#[derive(Debug)]
pub struct StewardState {
    /// Server identity for the MCP handshake.
    pub server_info: ServerInfo,
    /// Current application lifecycle state.
    pub state: AtomicU8,
    /// The process-wide MCP session.
    pub session: tokio::sync::RwLock<Session>,
    /// Registry of all loaded plugins, their tools and resources.
    pub registry: PluginRegistry,
    /// Admission and audit gate for mutating operations.
    pub kernel: SecurityKernel,
    /// Audited command execution engine.
    pub executor: Arc<CommandExecutor>,
    /// Durable snapshot store.
    pub snapshots: Arc<SnapshotStore>,
}

impl StewardState {
    /// Build the component graph from configuration.
    pub async fn from_config(config: &StewardConfig) -> Result<Arc<Self>, StewardError> {
        let audit = AuditLog::new(config.security.audit_all);

        let executor = Arc::new(CommandExecutor::new(
            config.security.allowed_commands.clone(),
            config.security.command_timeout,
        ));

        let snapshots = Arc::new(
            SnapshotStore::new(
                config.snapshots.dir.clone(),
                Arc::new(NullServiceState),
                audit.clone(),
            )
            .await?,
        );

        Ok(Arc::new(Self {
            server_info: ServerInfo::default(),
            state: AtomicU8::new(ApplicationState::Unknown as u8),
            session: tokio::sync::RwLock::new(Session::default()),
            registry: PluginRegistry::new(),
            kernel: SecurityKernel::new(config.security.max_concurrent_operations, audit),
            executor,
            snapshots,
        }))
    }

    /// Set application lifecycle state.
    pub fn set_state(&self, value: ApplicationState) {
        debug!("Application state changed to {:?}", value);
        self.state.store(value as u8, Ordering::Relaxed);
    }

    /// Returns true if the application is running (liveness check).
    pub fn is_alive(&self) -> bool {
        let state = self.state.load(Ordering::SeqCst);
        state >= ApplicationState::Initializing as u8 && state < ApplicationState::Terminating as u8
    }

    /// Returns true if the application is ready to serve requests.
    pub fn is_ready(&self) -> bool {
        self.state.load(Ordering::SeqCst) >= ApplicationState::Ready as u8
    }

    /// Whether the MCP handshake has completed.
    pub async fn is_initialized(&self) -> bool {
        self.session.read().await.initialized
    }

    /// Record the client identity; written once during the handshake.
    pub async fn set_client_info(&self, info: ClientInfo) {
        let mut session = self.session.write().await;
        if session.client_info.is_none() {
            session.client_info = Some(info);
        }
    }

    /// Flip the session into the initialized state.
    pub async fn mark_initialized(&self) {
        let mut session = self.session.write().await;
        session.initialized = true;
    }
}
