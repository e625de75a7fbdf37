//! JSON-RPC 2.0 envelope types for the MCP surface.
//!
//! Requests arrive as raw [`serde_json::Value`]s so that malformed frames
//! can still be answered with a well-formed error envelope; the dispatch
//! logic in [`machine`] performs shape validation itself instead of relying
//! on serde rejecting the frame outright. Responses are typed and always
//! carry exactly one of `result` or `error`.

pub mod machine;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::StewardError;

/// Protocol version tag required on every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol revision advertised during the handshake.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcError {
    /// Numeric code from the fixed taxonomy.
    pub code: i64,
    /// Human-readable message; the innermost cause is preserved here.
    pub message: String,
    /// Optional structured detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// JSON-RPC response envelope.
///
/// Exactly one of `result` or `error` is serialized. `id` echoes the
/// request id, or is `null` when the id could not be recovered from the
/// frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Value,
}

impl Response {
    /// Successful response carrying `result`.
    pub fn ok(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Error response with an explicit code and message.
    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }

    /// Error response derived from a [`StewardError`].
    pub fn from_error(id: Value, err: &StewardError) -> Self {
        Self::error(id, err.code(), err.to_string())
    }
}

/// Client identity captured during `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// Per-process MCP session state.
///
/// Created at startup, mutated only by the handshake pair, destroyed at
/// shutdown. All dispatch except the handshake methods requires
/// `initialized` to be true.
#[derive(Debug, Default)]
pub struct Session {
    pub initialized: bool,
    pub client_info: Option<ClientInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn response_serializes_exactly_one_of_result_or_error() {
        let ok = Response::ok(json!(1), json!({"x": true}));
        let v = serde_json::to_value(&ok).unwrap();
        assert!(v.get("result").is_some());
        assert!(v.get("error").is_none());

        let err = Response::error(json!("a"), -32601, "Method not found: nope");
        let v = serde_json::to_value(&err).unwrap();
        assert!(v.get("result").is_none());
        assert_eq!(v["error"]["code"], json!(-32601));
        assert_eq!(v["id"], json!("a"));
    }

    #[test]
    fn error_conversion_keeps_code_and_message() {
        let e = StewardError::InvalidParams("Missing tool name".into());
        let resp = Response::from_error(Value::Null, &e);
        let err = resp.error.unwrap();
        assert_eq!(err.code, -32602);
        assert_eq!(err.message, "Missing tool name");
    }
}
