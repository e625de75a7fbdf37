use std::sync::Arc;

use serde_json::{Value, json};
use steward::errors::StewardError;
use steward::plugins::registry::PluginRegistry;
use steward::plugins::{Plugin, ResourceDescriptor, ToolDescriptor, text_result};

/// Minimal plugin with configurable descriptors.
struct StubPlugin {
    name: String,
    tools: Vec<ToolDescriptor>,
    resources: Vec<ResourceDescriptor>,
}

impl StubPlugin {
    fn new(name: &str, tools: &[&str], resources: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            tools: tools
                .iter()
                .map(|t| ToolDescriptor {
                    name: t.to_string(),
                    description: format!("stub tool {t}"),
                    input_schema: json!({ "type": "object" }),
                })
                .collect(),
            resources: resources
                .iter()
                .map(|r| ResourceDescriptor {
                    uri: r.to_string(),
                    name: r.to_string(),
                    description: format!("stub resource {r}"),
                    mime_type: "text/plain".to_string(),
                })
                .collect(),
        })
    }
}

#[async_trait::async_trait]
impl Plugin for StubPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn tools(&self) -> Vec<ToolDescriptor> {
        self.tools.clone()
    }

    fn resources(&self) -> Vec<ResourceDescriptor> {
        self.resources.clone()
    }

    async fn execute_tool(&self, name: &str, _args: Value) -> Result<Value, StewardError> {
        Ok(text_result(format!("{}::{}", self.name, name)))
    }

    async fn read_resource(&self, uri: &str) -> Result<Value, StewardError> {
        Ok(json!({ "content": { "uri": uri, "text": self.name } }))
    }
}

#[tokio::test]
/// Register then unregister returns the registry to its prior state.
async fn register_unregister_round_trip() {
    let registry = PluginRegistry::new();
    assert!(registry.list_tools().await.is_empty());

    let plugin = StubPlugin::new("alpha", &["t1", "t2"], &["res://a"]);
    registry.register(plugin).await.unwrap();

    assert_eq!(registry.list_tools().await.len(), 2);
    assert_eq!(registry.list_resources().await.len(), 1);
    assert_eq!(registry.list_plugins().await, vec!["alpha".to_string()]);

    assert!(registry.unregister("alpha").await.unwrap());

    assert!(registry.list_tools().await.is_empty());
    assert!(registry.list_resources().await.is_empty());
    assert!(registry.list_plugins().await.is_empty());
}

#[tokio::test]
/// A tool-name collision aborts the whole registration; nothing from the
/// colliding plugin is retained.
async fn tool_name_collision_aborts_registration() {
    let registry = PluginRegistry::new();
    registry
        .register(StubPlugin::new("alpha", &["shared"], &[]))
        .await
        .unwrap();

    let before_tools = registry.list_tools().await.len();
    let err = registry
        .register(StubPlugin::new("beta", &["shared", "unique"], &["res://b"]))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("shared"));

    // Registry state equals its state before the attempted registration.
    assert_eq!(registry.list_tools().await.len(), before_tools);
    assert!(registry.tool_descriptor("unique").await.is_none());
    assert!(registry.list_resources().await.is_empty());
    assert_eq!(registry.list_plugins().await, vec!["alpha".to_string()]);
}

#[tokio::test]
async fn resource_uri_collision_aborts_registration() {
    let registry = PluginRegistry::new();
    registry
        .register(StubPlugin::new("alpha", &[], &["res://shared"]))
        .await
        .unwrap();

    let err = registry
        .register(StubPlugin::new("beta", &["tool-b"], &["res://shared"]))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("res://shared"));

    assert!(registry.tool_descriptor("tool-b").await.is_none());
    assert_eq!(registry.list_plugins().await, vec!["alpha".to_string()]);
}

#[tokio::test]
async fn duplicate_plugin_name_is_rejected() {
    let registry = PluginRegistry::new();
    registry
        .register(StubPlugin::new("alpha", &["t1"], &[]))
        .await
        .unwrap();

    let err = registry
        .register(StubPlugin::new("alpha", &["t2"], &[]))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already registered"));
    assert!(registry.tool_descriptor("t2").await.is_none());
}

#[tokio::test]
/// Unregistering removes exactly the entries the plugin owns.
async fn unregister_removes_only_owned_entries() {
    let registry = PluginRegistry::new();
    registry
        .register(StubPlugin::new("alpha", &["a1"], &["res://a"]))
        .await
        .unwrap();
    registry
        .register(StubPlugin::new("beta", &["b1"], &["res://b"]))
        .await
        .unwrap();

    assert!(registry.unregister("alpha").await.unwrap());

    assert!(registry.tool_descriptor("a1").await.is_none());
    assert!(registry.tool_descriptor("b1").await.is_some());
    assert_eq!(registry.list_resources().await.len(), 1);
    assert_eq!(registry.list_plugins().await, vec!["beta".to_string()]);
}

#[tokio::test]
async fn unregister_unknown_plugin_returns_false() {
    let registry = PluginRegistry::new();
    assert!(!registry.unregister("ghost").await.unwrap());
}

#[tokio::test]
async fn execute_tool_dispatches_to_owner() {
    let registry = PluginRegistry::new();
    registry
        .register(StubPlugin::new("alpha", &["a1"], &[]))
        .await
        .unwrap();
    registry
        .register(StubPlugin::new("beta", &["b1"], &[]))
        .await
        .unwrap();

    let result = registry.execute_tool("b1", json!({})).await.unwrap();
    assert_eq!(result["content"][0]["text"], "beta::b1");
}

#[tokio::test]
async fn missing_tool_and_resource_report_not_found() {
    let registry = PluginRegistry::new();

    let err = registry.execute_tool("ghost", json!({})).await.unwrap_err();
    assert!(err.to_string().contains("Tool not found"));

    let err = registry.read_resource("res://ghost").await.unwrap_err();
    assert!(err.to_string().contains("Resource not found"));
}
