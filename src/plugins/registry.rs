use std::{collections::HashMap, fmt, sync::Arc};

use serde_json::Value;

use crate::errors::StewardError;
use crate::plugins::{PluginRef, ResourceDescriptor, ToolDescriptor};

/// Inner store holding descriptor and ownership maps (kept behind the
/// registry's RwLock).
#[derive(Default)]
pub struct RegistryStore {
    /// Plugin name to plugin handle.
    plugins: HashMap<String, PluginRef>,

    /// Tool name to owning plugin name.
    tool_to_plugin: HashMap<String, String>,

    /// Tool name to descriptor.
    tool_to_def: HashMap<String, ToolDescriptor>,

    /// Resource URI to owning plugin name.
    resource_to_plugin: HashMap<String, String>,

    /// Resource URI to descriptor.
    resource_to_def: HashMap<String, ResourceDescriptor>,
}

/// Custom Debug implementation so handles don't spam logs.
impl fmt::Debug for RegistryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryStore")
            .field("plugins", &self.plugins.keys())
            .field("tools", &self.tool_to_def.keys())
            .field("resources", &self.resource_to_def.keys())
            .finish()
    }
}

/// Namespace for tool and resource descriptors across all plugins.
///
/// Register/unregister are mutually exclusive with list/dispatch through
/// the read-write lock. Tool names and resource URIs are globally unique;
/// a colliding registration is aborted wholesale, leaving the registry
/// exactly as it was.
#[derive(Clone, Debug, Default)]
pub struct PluginRegistry {
    catalog: Arc<tokio::sync::RwLock<RegistryStore>>,
}

impl PluginRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin: run its init hook, fetch descriptors, verify no
    /// tool-name or resource-URI collision, then insert.
    ///
    /// On any collision the insertion is aborted and no descriptor from
    /// the colliding plugin is retained.
    pub async fn register(&self, plugin: PluginRef) -> Result<(), StewardError> {
        plugin.initialize().await?;

        let tools = plugin.tools();
        let resources = plugin.resources();
        let plugin_name = plugin.name().to_string();

        let mut catalog = self.catalog.write().await;

        if catalog.plugins.contains_key(&plugin_name) {
            return Err(StewardError::internal(format!(
                "Plugin already registered: {plugin_name}"
            )));
        }
        for tool in &tools {
            if let Some(owner) = catalog.tool_to_plugin.get(&tool.name) {
                return Err(StewardError::internal(format!(
                    "Tool name collision: '{}' is already owned by plugin '{}'",
                    tool.name, owner
                )));
            }
        }
        for resource in &resources {
            if let Some(owner) = catalog.resource_to_plugin.get(&resource.uri) {
                return Err(StewardError::internal(format!(
                    "Resource URI collision: '{}' is already owned by plugin '{}'",
                    resource.uri, owner
                )));
            }
        }

        for tool in tools {
            catalog
                .tool_to_plugin
                .insert(tool.name.clone(), plugin_name.clone());
            catalog.tool_to_def.insert(tool.name.clone(), tool);
        }
        for resource in resources {
            catalog
                .resource_to_plugin
                .insert(resource.uri.clone(), plugin_name.clone());
            catalog
                .resource_to_def
                .insert(resource.uri.clone(), resource);
        }
        catalog.plugins.insert(plugin_name.clone(), plugin);

        tracing::info!(plugin = %plugin_name, "Plugin registered");
        Ok(())
    }

    /// Unregister a plugin, removing exactly the entries it owns, then run
    /// its cleanup hook.
    ///
    /// Returns `true` if the plugin was present.
    pub async fn unregister(&self, name: &str) -> Result<bool, StewardError> {
        let plugin = {
            let mut catalog = self.catalog.write().await;

            let Some(plugin) = catalog.plugins.remove(name) else {
                return Ok(false);
            };

            let tool_names: Vec<_> = catalog
                .tool_to_plugin
                .iter()
                .filter(|(_, owner)| owner.as_str() == name)
                .map(|(tool, _)| tool.clone())
                .collect();
            for tool in tool_names {
                catalog.tool_to_plugin.remove(&tool);
                catalog.tool_to_def.remove(&tool);
            }

            let uris: Vec<_> = catalog
                .resource_to_plugin
                .iter()
                .filter(|(_, owner)| owner.as_str() == name)
                .map(|(uri, _)| uri.clone())
                .collect();
            for uri in uris {
                catalog.resource_to_plugin.remove(&uri);
                catalog.resource_to_def.remove(&uri);
            }

            plugin
        };

        plugin.cleanup().await?;
        tracing::info!(plugin = %name, "Plugin unregistered");
        Ok(true)
    }

    /// All tool descriptors across plugins.
    pub async fn list_tools(&self) -> Vec<ToolDescriptor> {
        let catalog = self.catalog.read().await;
        catalog.tool_to_def.values().cloned().collect()
    }

    /// All resource descriptors across plugins.
    pub async fn list_resources(&self) -> Vec<ResourceDescriptor> {
        let catalog = self.catalog.read().await;
        catalog.resource_to_def.values().cloned().collect()
    }

    /// Names of all registered plugins.
    pub async fn list_plugins(&self) -> Vec<String> {
        let catalog = self.catalog.read().await;
        catalog.plugins.keys().cloned().collect()
    }

    /// Descriptor for a single tool, if registered.
    pub async fn tool_descriptor(&self, name: &str) -> Option<ToolDescriptor> {
        let catalog = self.catalog.read().await;
        catalog.tool_to_def.get(name).cloned()
    }

    /// Execute a tool by name.
    ///
    /// The owning plugin handle is cloned while holding the lock and
    /// invoked outside it so a slow handler cannot block registration.
    pub async fn execute_tool(&self, name: &str, args: Value) -> Result<Value, StewardError> {
        let plugin = {
            let catalog = self.catalog.read().await;
            catalog
                .tool_to_plugin
                .get(name)
                .and_then(|owner| catalog.plugins.get(owner))
                .cloned()
        };

        match plugin {
            Some(p) => p.execute_tool(name, args).await,
            None => Err(StewardError::internal(format!("Tool not found: {name}"))),
        }
    }

    /// Read a resource by URI, dispatching to its owning plugin.
    pub async fn read_resource(&self, uri: &str) -> Result<Value, StewardError> {
        let plugin = {
            let catalog = self.catalog.read().await;
            catalog
                .resource_to_plugin
                .get(uri)
                .and_then(|owner| catalog.plugins.get(owner))
                .cloned()
        };

        match plugin {
            Some(p) => p.read_resource(uri).await,
            None => Err(StewardError::internal(format!("Resource not found: {uri}"))),
        }
    }

    /// Run every plugin's cleanup hook. Called once during shutdown;
    /// failures are logged and do not stop the remaining hooks.
    pub async fn cleanup(&self) {
        let plugins: Vec<PluginRef> = {
            let catalog = self.catalog.read().await;
            catalog.plugins.values().cloned().collect()
        };

        for plugin in plugins {
            if let Err(e) = plugin.cleanup().await {
                tracing::warn!(plugin = %plugin.name(), error = %e, "Plugin cleanup failed");
            }
        }
    }
}
