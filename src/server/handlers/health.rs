//! Health check handler for the Steward daemon.
//!
//! # Endpoint
//!
//! - `GET /health` - Returns the daemon status, version, timestamp and the
//!   names of all registered plugins.
//!
//! # Response Format
//!
//! `{"status": "healthy", "version": "...", "timestamp": "...",
//! "plugins": [...]}` with 200/OK while the daemon is alive, or
//! `status: "unhealthy"` with 503 once it starts terminating.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse, response::Response};
use chrono::Utc;
use serde_json::json;

use crate::state::StewardState;

/// Health check handler.
///
/// # Parameters
/// - `state`: Application state carrying liveness and the plugin registry
///
/// # Returns
/// - 200 OK with the health document while the daemon is alive
/// - 503 Service Unavailable once it is terminating
pub async fn health(State(state): State<Arc<StewardState>>) -> Response {
    tracing::debug!("health_handler invoked");

    let alive = state.is_alive();
    let (status, text) = if alive {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    let body = json!({
        "status": text,
        "version": state.server_info.version,
        "timestamp": Utc::now().to_rfc3339(),
        "plugins": state.registry.list_plugins().await,
    });

    (status, Json(body)).into_response()
}
