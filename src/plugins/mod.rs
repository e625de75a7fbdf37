//! Plugin system for the Steward daemon.
//!
//! A plugin is a small capability interface: it names itself, lists tool
//! and resource descriptors, and executes calls routed to it by the
//! registry. Shared result/content constructors live here as free
//! functions so plugin bodies stay thin; argument validation is owned by
//! the [`validator`] module and runs before any handler is invoked.
//!
//! # Registration flow
//!
//! 1. Configuration decides which plugins are enabled
//! 2. Each plugin's `initialize` hook runs
//! 3. Its descriptors are checked for name/URI collisions and inserted
//!    atomically
//! 4. If no plugin is enabled, the built-in system plugin is registered so
//!    the server always exposes a usable surface

pub mod builtin;
pub mod registry;
pub mod validator;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::errors::StewardError;

/// Descriptor for a named, schema-bounded tool.
///
/// The handler lives on the owning plugin, never on the descriptor, so
/// serializing a descriptor for `tools/list` is always safe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Globally unique tool name.
    pub name: String,
    /// Human description shown to clients.
    pub description: String,
    /// JSON-Schema subset describing the accepted arguments.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Descriptor for a read-only resource identified by URI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Globally unique resource URI.
    pub uri: String,
    /// Display name.
    pub name: String,
    /// Human description.
    pub description: String,
    /// MIME type of the resource content.
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

/// Capability interface implemented by every plugin.
///
/// `initialize` and `cleanup` are optional lifecycle hooks with default
/// no-op implementations. Tool and resource listings must be stable for
/// the lifetime of the registration.
#[async_trait::async_trait]
pub trait Plugin: Send + Sync {
    /// Unique plugin name; owns the descriptors it registers.
    fn name(&self) -> &str;

    /// Called once before the plugin's descriptors are registered.
    async fn initialize(&self) -> Result<(), StewardError> {
        Ok(())
    }

    /// Called when the plugin is unregistered or at shutdown.
    async fn cleanup(&self) -> Result<(), StewardError> {
        Ok(())
    }

    /// Tool descriptors this plugin provides.
    fn tools(&self) -> Vec<ToolDescriptor> {
        Vec::new()
    }

    /// Resource descriptors this plugin provides.
    fn resources(&self) -> Vec<ResourceDescriptor> {
        Vec::new()
    }

    /// Execute a tool owned by this plugin. Arguments have already been
    /// validated against the tool's input schema.
    async fn execute_tool(&self, name: &str, args: Value) -> Result<Value, StewardError>;

    /// Read a resource owned by this plugin.
    async fn read_resource(&self, uri: &str) -> Result<Value, StewardError>;
}

/// Shared handle to a plugin.
pub type PluginRef = Arc<dyn Plugin>;

/// Loads all configured plugins and registers them with the application
/// state.
///
/// Plugins are registered in configuration order. If no plugin ends up
/// registered, the built-in system plugin is registered as a fallback so
/// the server always has a tool surface.
pub async fn load_plugins(
    config: &crate::config::StewardConfig,
    state: Arc<crate::state::StewardState>,
) -> Result<(), StewardError> {
    tracing::debug!("Searching for configured plugins");

    for (name, plugin_cfg) in &config.plugins {
        if !plugin_cfg.enabled {
            tracing::debug!(plugin = %name, "Plugin disabled in configuration");
            continue;
        }
        match name.as_str() {
            builtin::BUILTIN_PLUGIN_ID => {
                let plugin = Arc::new(builtin::SystemPlugin::new(
                    state.executor.clone(),
                    state.snapshots.clone(),
                ));
                state.registry.register(plugin).await?;
            }
            other => {
                tracing::warn!(plugin = %other, "Unknown plugin in configuration, skipping");
            }
        }
    }

    if state.registry.list_plugins().await.is_empty() {
        tracing::warn!("No plugins loaded, registering builtin system plugin");
        let plugin = Arc::new(builtin::SystemPlugin::new(
            state.executor.clone(),
            state.snapshots.clone(),
        ));
        state.registry.register(plugin).await?;
    }

    Ok(())
}

/// Builds a `{type:"text"}` content block.
pub fn text_content(text: impl Into<String>) -> Value {
    json!({ "type": "text", "text": text.into() })
}

/// Builds a `{type:"image"}` content block from base64 data.
pub fn image_content(data: impl Into<String>, mime_type: impl Into<String>) -> Value {
    json!({ "type": "image", "data": data.into(), "mimeType": mime_type.into() })
}

/// Builds a `{type:"resource"}` content block referencing a URI.
pub fn resource_content(uri: impl Into<String>) -> Value {
    json!({ "type": "resource", "uri": uri.into() })
}

/// Wraps content blocks into the standard tool result envelope.
pub fn tool_result(content: Vec<Value>, is_error: bool) -> Value {
    json!({ "content": content, "isError": is_error })
}

/// Convenience wrapper for a single-text successful tool result.
pub fn text_result(text: impl Into<String>) -> Value {
    tool_result(vec![text_content(text)], false)
}

/// Wraps a resource payload into the `resources/read` result shape.
pub fn resource_text(
    uri: impl Into<String>,
    mime_type: impl Into<String>,
    text: impl Into<String>,
) -> Value {
    json!({
        "content": {
            "uri": uri.into(),
            "mimeType": mime_type.into(),
            "text": text.into(),
        }
    })
}
