//! HTTP service implementation - builds the router and runs the server.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    config::StewardConfig,
    server::handlers::{
        health::health,
        mcp::{mcp_post, mcp_ws},
    },
    state::{ApplicationState, StewardState},
};

/// Builds the application router.
///
/// All endpoints share one protocol core; CORS is permissive because the
/// daemon serves local tooling on loopback.
pub fn build_router(state: Arc<StewardState>) -> Router {
    Router::new()
        .route("/mcp", post(mcp_post))
        .route("/mcp/ws", get(mcp_ws))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds the configured address and serves until a shutdown signal
/// arrives, then runs the shutdown sequence: terminate all child
/// processes, then plugin cleanup hooks.
pub async fn start(config: &StewardConfig, state: Arc<StewardState>) -> anyhow::Result<()> {
    let app = build_router(state.clone());
    let addr = config.bind_address();

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    state.set_state(ApplicationState::Ready);
    info!("Listening on {addr}");

    // select! needs a plain future; Serve only implements IntoFuture.
    let server = axum::serve(listener, app).into_future();
    tokio::select! {
        result = server => {
            result.context("server error")?;
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    state.set_state(ApplicationState::Terminating);
    state.executor.kill_all_processes().await;
    state.registry.cleanup().await;
    info!("Shutdown complete");

    Ok(())
}

/// Resolves when ctrl-c or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
