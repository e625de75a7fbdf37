use std::sync::Arc;

use serde_json::{Value, json};
use steward::config::StewardConfig;
use steward::plugins;
use steward::protocol::machine;
use steward::state::{ApplicationState, StewardState};

/// Builds a state with the builtin plugin registered and snapshots under
/// a temp dir. The TempDir must outlive the state.
async fn test_state() -> (Arc<StewardState>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = StewardConfig::default();
    config.snapshots.dir = dir.path().join("snapshots");
    let state = StewardState::from_config(&config).await.unwrap();
    state.set_state(ApplicationState::LoadingPlugins);
    plugins::load_plugins(&config, state.clone())
        .await
        .unwrap();
    (state, dir)
}

/// Runs the handshake pair: `initialize` then the `initialized`
/// notification.
async fn handshake(state: &Arc<StewardState>) {
    let resp = machine::handle(
        state,
        json!({
            "jsonrpc": "2.0",
            "method": "initialize",
            "id": 1,
            "params": { "clientInfo": { "name": "test-client", "version": "0.1" } }
        }),
    )
    .await
    .expect("initialize always responds");
    assert!(resp.error.is_none(), "handshake failed: {:?}", resp.error);

    let none = machine::handle(state, json!({ "jsonrpc": "2.0", "method": "initialized" })).await;
    assert!(none.is_none(), "notification must not produce a response");
}

#[tokio::test]
/// Dispatch before the handshake must yield -32002 with the id echoed.
async fn tools_list_before_handshake_is_rejected() {
    let (state, _dir) = test_state().await;

    let resp = machine::handle(
        &state,
        json!({ "jsonrpc": "2.0", "method": "tools/list", "id": 1 }),
    )
    .await
    .unwrap();

    assert_eq!(resp.id, json!(1));
    assert!(resp.result.is_none());
    assert_eq!(resp.error.unwrap().code, -32002);
}

#[tokio::test]
/// A wrong jsonrpc tag is an invalid request, with the id still echoed.
async fn wrong_jsonrpc_version_is_invalid_request() {
    let (state, _dir) = test_state().await;

    let resp = machine::handle(
        &state,
        json!({ "jsonrpc": "1.0", "method": "initialize", "id": 9 }),
    )
    .await
    .unwrap();

    assert_eq!(resp.id, json!(9));
    assert_eq!(resp.error.unwrap().code, -32600);
}

#[tokio::test]
async fn non_object_envelope_is_invalid_request_with_null_id() {
    let (state, _dir) = test_state().await;

    let resp = machine::handle(&state, json!([1, 2, 3])).await.unwrap();
    assert_eq!(resp.id, Value::Null);
    assert_eq!(resp.error.unwrap().code, -32600);
}

#[tokio::test]
async fn missing_method_is_invalid_request() {
    let (state, _dir) = test_state().await;

    let resp = machine::handle(&state, json!({ "jsonrpc": "2.0", "id": 2 }))
        .await
        .unwrap();
    assert_eq!(resp.error.unwrap().code, -32600);
}

#[tokio::test]
async fn unknown_method_is_method_not_found() {
    let (state, _dir) = test_state().await;
    handshake(&state).await;

    let resp = machine::handle(
        &state,
        json!({ "jsonrpc": "2.0", "method": "tools/fly", "id": 3 }),
    )
    .await
    .unwrap();

    let err = resp.error.unwrap();
    assert_eq!(err.code, -32601);
    assert!(err.message.contains("tools/fly"));
}

#[tokio::test]
/// The handshake result carries the exact advertised shape.
async fn initialize_returns_handshake_result() {
    let (state, _dir) = test_state().await;

    let resp = machine::handle(
        &state,
        json!({ "jsonrpc": "2.0", "method": "initialize", "id": 1 }),
    )
    .await
    .unwrap();

    let result = resp.result.unwrap();
    assert_eq!(result["protocolVersion"], "2024-11-05");
    assert_eq!(result["capabilities"]["tools"]["listChanged"], true);
    assert_eq!(result["capabilities"]["resources"]["subscribe"], true);
    assert_eq!(result["capabilities"]["resources"]["listChanged"], true);
    assert_eq!(result["capabilities"]["prompts"]["listChanged"], true);
    assert_eq!(result["serverInfo"]["name"], "steward");
}

#[tokio::test]
/// `initialize` without an id still responds, with id null.
async fn initialize_without_id_responds_with_null_id() {
    let (state, _dir) = test_state().await;

    let resp = machine::handle(&state, json!({ "jsonrpc": "2.0", "method": "initialize" }))
        .await
        .unwrap();
    assert_eq!(resp.id, Value::Null);
    assert!(resp.result.is_some());
}

#[tokio::test]
/// `initialized` with an id is answered with an empty object.
async fn initialized_with_id_returns_empty_object() {
    let (state, _dir) = test_state().await;

    let resp = machine::handle(
        &state,
        json!({ "jsonrpc": "2.0", "method": "initialized", "id": 7 }),
    )
    .await
    .unwrap();
    assert_eq!(resp.result.unwrap(), json!({}));
    assert!(state.is_initialized().await);
}

#[tokio::test]
async fn completion_complete_works_before_handshake() {
    let (state, _dir) = test_state().await;

    let resp = machine::handle(
        &state,
        json!({ "jsonrpc": "2.0", "method": "completion/complete", "id": 4 }),
    )
    .await
    .unwrap();

    let result = resp.result.unwrap();
    assert_eq!(result["completion"]["values"], json!([]));
    assert_eq!(result["completion"]["total"], 0);
    assert_eq!(result["completion"]["hasMore"], false);
}

#[tokio::test]
/// After the handshake, the builtin echo tool is listed.
async fn tools_list_contains_echo() {
    let (state, _dir) = test_state().await;
    handshake(&state).await;

    let resp = machine::handle(
        &state,
        json!({ "jsonrpc": "2.0", "method": "tools/list", "id": 2 }),
    )
    .await
    .unwrap();

    let tools = resp.result.unwrap()["tools"].as_array().unwrap().clone();
    let echo: Vec<_> = tools
        .iter()
        .filter(|t| t["name"] == "echo")
        .collect();
    assert_eq!(echo.len(), 1);
    assert!(echo[0].get("inputSchema").is_some());
    assert!(echo[0].get("handler").is_none());
}

#[tokio::test]
async fn echo_round_trips_through_tools_call() {
    let (state, _dir) = test_state().await;
    handshake(&state).await;

    let resp = machine::handle(
        &state,
        json!({
            "jsonrpc": "2.0",
            "method": "tools/call",
            "id": 5,
            "params": { "name": "echo", "arguments": { "message": "hello" } }
        }),
    )
    .await
    .unwrap();

    let result = resp.result.unwrap();
    assert_eq!(result["isError"], false);
    assert_eq!(result["content"][0]["type"], "text");
    assert_eq!(result["content"][0]["text"], "hello");
}

#[tokio::test]
/// Schema violation: echo requires a string message.
async fn echo_with_wrong_type_is_invalid_params() {
    let (state, _dir) = test_state().await;
    handshake(&state).await;

    let resp = machine::handle(
        &state,
        json!({
            "jsonrpc": "2.0",
            "method": "tools/call",
            "id": 6,
            "params": { "name": "echo", "arguments": { "message": 42 } }
        }),
    )
    .await
    .unwrap();

    assert_eq!(resp.error.unwrap().code, -32602);
}

#[tokio::test]
async fn tools_call_without_name_is_invalid_params() {
    let (state, _dir) = test_state().await;
    handshake(&state).await;

    let resp = machine::handle(
        &state,
        json!({ "jsonrpc": "2.0", "method": "tools/call", "id": 8, "params": {} }),
    )
    .await
    .unwrap();

    let err = resp.error.unwrap();
    assert_eq!(err.code, -32602);
    assert!(err.message.contains("tool name"));
}

#[tokio::test]
async fn unknown_tool_surfaces_internal_error() {
    let (state, _dir) = test_state().await;
    handshake(&state).await;

    let resp = machine::handle(
        &state,
        json!({
            "jsonrpc": "2.0",
            "method": "tools/call",
            "id": 9,
            "params": { "name": "does_not_exist" }
        }),
    )
    .await
    .unwrap();

    let err = resp.error.unwrap();
    assert_eq!(err.code, -32603);
    assert!(err.message.contains("Tool not found"));
}

#[tokio::test]
async fn resources_list_and_read_system_info() {
    let (state, _dir) = test_state().await;
    handshake(&state).await;

    let resp = machine::handle(
        &state,
        json!({ "jsonrpc": "2.0", "method": "resources/list", "id": 10 }),
    )
    .await
    .unwrap();
    let resources = resp.result.unwrap()["resources"].as_array().unwrap().clone();
    assert!(
        resources
            .iter()
            .any(|r| r["uri"] == "steward://system/info")
    );

    let resp = machine::handle(
        &state,
        json!({
            "jsonrpc": "2.0",
            "method": "resources/read",
            "id": 11,
            "params": { "uri": "steward://system/info" }
        }),
    )
    .await
    .unwrap();
    let content = &resp.result.unwrap()["content"];
    assert_eq!(content["uri"], "steward://system/info");
    assert_eq!(content["mimeType"], "application/json");
}

#[tokio::test]
async fn resources_read_without_uri_is_invalid_params() {
    let (state, _dir) = test_state().await;
    handshake(&state).await;

    let resp = machine::handle(
        &state,
        json!({ "jsonrpc": "2.0", "method": "resources/read", "id": 12, "params": {} }),
    )
    .await
    .unwrap();

    assert_eq!(resp.error.unwrap().code, -32602);
}

#[tokio::test]
async fn resources_subscribe_is_acknowledged() {
    let (state, _dir) = test_state().await;
    handshake(&state).await;

    let resp = machine::handle(
        &state,
        json!({
            "jsonrpc": "2.0",
            "method": "resources/subscribe",
            "id": 13,
            "params": { "uri": "steward://system/info" }
        }),
    )
    .await
    .unwrap();
    assert_eq!(resp.result.unwrap(), json!({}));
}

#[tokio::test]
/// A disallowed command surfaces -31001 through the whole dispatch path
/// and no child is spawned.
async fn disallowed_command_is_rejected_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = StewardConfig::default();
    config.snapshots.dir = dir.path().join("snapshots");
    config.security.allowed_commands = vec!["ls".to_string()];
    let state = StewardState::from_config(&config).await.unwrap();
    plugins::load_plugins(&config, state.clone())
        .await
        .unwrap();
    handshake(&state).await;

    let resp = machine::handle(
        &state,
        json!({
            "jsonrpc": "2.0",
            "method": "tools/call",
            "id": 20,
            "params": { "name": "run_command", "arguments": { "command": "rm" } }
        }),
    )
    .await
    .unwrap();

    let err = resp.error.unwrap();
    assert_eq!(err.code, -31001);
    assert_eq!(err.message, "Command not allowed: rm");
    assert!(state.executor.live_processes().is_empty());
}

#[tokio::test]
/// Invariant: every response carries exactly one of result/error.
async fn responses_carry_exactly_one_of_result_or_error() {
    let (state, _dir) = test_state().await;
    handshake(&state).await;

    let frames = vec![
        json!({ "jsonrpc": "2.0", "method": "tools/list", "id": 1 }),
        json!({ "jsonrpc": "2.0", "method": "nope", "id": 2 }),
        json!({ "jsonrpc": "1.0", "method": "tools/list", "id": 3 }),
        json!({ "jsonrpc": "2.0", "method": "tools/call", "id": 4, "params": {} }),
    ];

    for frame in frames {
        let resp = machine::handle(&state, frame.clone()).await.unwrap();
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            v.get("result").is_some() as u8 + v.get("error").is_some() as u8,
            1,
            "frame {frame} produced a malformed envelope: {v}"
        );
        assert_eq!(v["id"], frame["id"]);
    }
}
