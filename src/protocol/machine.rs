//! MCP method dispatch over decoded JSON-RPC envelopes.
//!
//! The state machine is purely functional over (session, registry,
//! request): it validates the envelope, gates non-handshake methods on the
//! session's `initialized` flag, and routes the method through a
//! fixed-keyed dispatch table. All side effects happen below it, in the
//! security kernel and the registry. Adding a method means adding a table
//! row, not touching the machine core.

use std::{pin::Pin, sync::Arc};

use serde_json::{Value, json};
use tracing::debug;

use crate::errors::{INVALID_REQUEST, METHOD_NOT_FOUND, StewardError};
use crate::plugins::validator;
use crate::protocol::{ClientInfo, JSONRPC_VERSION, MCP_PROTOCOL_VERSION, Response};
use crate::state::StewardState;

type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, StewardError>> + Send + 'a>>;

/// One row of the dispatch table.
type MethodHandler = for<'a> fn(&'a Arc<StewardState>, Option<&'a Value>) -> HandlerFuture<'a>;

/// Fixed method table. Handshake methods and the completion stub bypass
/// the initialization gate; everything else requires a completed
/// handshake.
const METHODS: &[(&str, MethodHandler)] = &[
    ("initialize", initialize),
    ("initialized", initialized),
    ("tools/list", tools_list),
    ("tools/call", tools_call),
    ("resources/list", resources_list),
    ("resources/read", resources_read),
    ("resources/subscribe", resources_subscribe),
    ("resources/unsubscribe", resources_subscribe),
    ("completion/complete", completion_complete),
];

/// Methods dispatchable before the handshake completes.
const PRE_INIT_METHODS: &[&str] = &["initialize", "initialized", "completion/complete"];

/// Process one decoded envelope and produce the response envelope, or
/// `None` for a notification.
///
/// Every malformed frame still yields a well-formed error envelope with
/// `id` echoed when recoverable and `null` otherwise.
pub async fn handle(state: &Arc<StewardState>, raw: Value) -> Option<Response> {
    let Some(obj) = raw.as_object() else {
        return Some(Response::error(
            Value::Null,
            INVALID_REQUEST,
            "Invalid Request: expected a JSON object",
        ));
    };

    let id = obj.get("id").cloned();
    let id_echo = id.clone().unwrap_or(Value::Null);

    if obj.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return Some(Response::error(
            id_echo,
            INVALID_REQUEST,
            "Invalid Request: missing or unsupported jsonrpc version",
        ));
    }

    let Some(method) = obj.get("method").and_then(Value::as_str) else {
        return Some(Response::error(
            id_echo,
            INVALID_REQUEST,
            "Invalid Request: missing method",
        ));
    };

    let params = obj.get("params");
    debug!(method, "Dispatching request");

    // The gate runs before method lookup: nothing outside the handshake
    // set is dispatchable, or even resolvable, on an uninitialized
    // session.
    if !PRE_INIT_METHODS.contains(&method) && !state.is_initialized().await {
        return Some(Response::from_error(id_echo, &StewardError::NotInitialized));
    }

    let Some((_, handler)) = METHODS.iter().find(|(name, _)| *name == method) else {
        return Some(Response::error(
            id_echo,
            METHOD_NOT_FOUND,
            format!("Method not found: {method}"),
        ));
    };

    // `initialized` without an id is a notification: the session flag is
    // still set, but no response is produced.
    let is_notification = id.is_none() && method == "initialized";

    match handler(state, params).await {
        Ok(result) => {
            if is_notification {
                None
            } else {
                Some(Response::ok(id_echo, result))
            }
        }
        Err(e) => {
            if is_notification {
                None
            } else {
                Some(Response::from_error(id_echo, &e))
            }
        }
    }
}

/// `initialize` - store the client identity, return the handshake result.
fn initialize<'a>(state: &'a Arc<StewardState>, params: Option<&'a Value>) -> HandlerFuture<'a> {
    Box::pin(async move {
        let client_info: ClientInfo = params
            .and_then(|p| p.get("clientInfo"))
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        state.set_client_info(client_info).await;

        Ok(json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": true },
                "resources": { "subscribe": true, "listChanged": true },
                "prompts": { "listChanged": true },
            },
            "serverInfo": {
                "name": state.server_info.name,
                "version": state.server_info.version,
            },
        }))
    })
}

/// `initialized` - flip the session flag.
fn initialized<'a>(state: &'a Arc<StewardState>, _params: Option<&'a Value>) -> HandlerFuture<'a> {
    Box::pin(async move {
        state.mark_initialized().await;
        Ok(json!({}))
    })
}

/// `tools/list` - descriptors only; handlers never cross the wire.
fn tools_list<'a>(state: &'a Arc<StewardState>, _params: Option<&'a Value>) -> HandlerFuture<'a> {
    Box::pin(async move {
        let tools = state.registry.list_tools().await;
        Ok(json!({ "tools": tools }))
    })
}

/// `tools/call` - resolve, validate, then dispatch through the kernel.
fn tools_call<'a>(state: &'a Arc<StewardState>, params: Option<&'a Value>) -> HandlerFuture<'a> {
    Box::pin(async move {
        let name = params
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
            .ok_or_else(|| StewardError::InvalidParams("Missing tool name".to_string()))?;
        let args = params
            .and_then(|p| p.get("arguments"))
            .cloned()
            .unwrap_or_else(|| json!({}));

        let descriptor = state
            .registry
            .tool_descriptor(name)
            .await
            .ok_or_else(|| StewardError::internal(format!("Tool not found: {name}")))?;

        validator::validate_arguments(&descriptor.input_schema, &args)?;

        let context = json!({ "tool": name, "arguments": args.clone() });
        state
            .kernel
            .execute_with_audit("tool_execution", context, || {
                state.registry.execute_tool(name, args)
            })
            .await
    })
}

/// `resources/list`.
fn resources_list<'a>(
    state: &'a Arc<StewardState>,
    _params: Option<&'a Value>,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let resources = state.registry.list_resources().await;
        Ok(json!({ "resources": resources }))
    })
}

/// `resources/read` - resolve by URI and dispatch through the kernel.
fn resources_read<'a>(
    state: &'a Arc<StewardState>,
    params: Option<&'a Value>,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let uri = params
            .and_then(|p| p.get("uri"))
            .and_then(Value::as_str)
            .ok_or_else(|| StewardError::InvalidParams("Missing resource URI".to_string()))?;

        let context = json!({ "uri": uri });
        state
            .kernel
            .execute_with_audit("resource_read", context, || {
                state.registry.read_resource(uri)
            })
            .await
    })
}

/// `resources/subscribe` / `resources/unsubscribe` - acknowledged but not
/// tracked; the handshake advertises the capability, and acknowledging
/// keeps that advertisement truthful.
fn resources_subscribe<'a>(
    _state: &'a Arc<StewardState>,
    params: Option<&'a Value>,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        params
            .and_then(|p| p.get("uri"))
            .and_then(Value::as_str)
            .ok_or_else(|| StewardError::InvalidParams("Missing resource URI".to_string()))?;
        Ok(json!({}))
    })
}

/// `completion/complete` - static empty completion set.
fn completion_complete<'a>(
    _state: &'a Arc<StewardState>,
    _params: Option<&'a Value>,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        Ok(json!({
            "completion": { "values": [], "total": 0, "hasMore": false }
        }))
    })
}
