//! MCP endpoint handlers: HTTP POST and the WebSocket message loop.
//!
//! Both adapters route every envelope through the same protocol state
//! machine; the transport never interprets methods itself. A client
//! always receives a single well-formed envelope per request, and the
//! WebSocket connection's lifetime is independent of in-flight
//! operations.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::PARSE_ERROR;
use crate::protocol::{self, machine};
use crate::state::StewardState;

/// `POST /mcp` - one envelope in, one envelope out.
///
/// A body that fails to decode as JSON yields a parse-error envelope with
/// `id` null; a notification yields 204 with no body.
pub async fn mcp_post(State(state): State<Arc<StewardState>>, body: Bytes) -> Response {
    let raw: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            let resp =
                protocol::Response::error(Value::Null, PARSE_ERROR, format!("Parse error: {e}"));
            return Json(resp).into_response();
        }
    };

    match machine::handle(&state, raw).await {
        Some(resp) => Json(resp).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// `GET /mcp/ws` - upgrade and hand the socket to the message loop.
pub async fn mcp_ws(ws: WebSocketUpgrade, State(state): State<Arc<StewardState>>) -> Response {
    debug!("WebSocket upgrade requested");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Per-connection message loop. Each text frame is parsed as an envelope
/// and routed identically to the HTTP path.
async fn handle_socket(mut socket: WebSocket, state: Arc<StewardState>) {
    debug!("WebSocket client connected");

    while let Some(msg) = socket.recv().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "WebSocket receive error");
                break;
            }
        };

        match msg {
            Message::Text(text) => {
                let reply = match serde_json::from_str::<Value>(&text) {
                    Ok(raw) => machine::handle(&state, raw).await,
                    Err(e) => Some(protocol::Response::error(
                        Value::Null,
                        PARSE_ERROR,
                        format!("Parse error: {e}"),
                    )),
                };

                if let Some(resp) = reply {
                    let json = match serde_json::to_string(&resp) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!(error = %e, "Failed to serialize response");
                            continue;
                        }
                    };
                    if socket.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
            }
            Message::Ping(data) => {
                if socket.send(Message::Pong(data)).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            Message::Binary(_) => warn!("Unexpected binary WebSocket message"),
            Message::Pong(_) => {}
        }
    }

    debug!("WebSocket client disconnected");
}
