//! Built-in system plugin.
//!
//! Registered as a fallback when no external plugin is enabled, so the
//! daemon always exposes a usable surface. Its tools are thin adapters
//! over the core substrate: `echo` for diagnostics, `run_command` over the
//! command executor, and the snapshot tools over the snapshot store.
//!
//! # Built-in Tools
//!
//! - **echo**: returns the input message unchanged
//! - **run_command**: executes an allowlisted command on the host
//! - **create_snapshot** / **restore_snapshot** / **delete_snapshot**:
//!   checkpoint and rollback surface
//!
//! # Built-in Resources
//!
//! - `steward://system/info`: host metadata
//! - `steward://snapshots`: snapshot catalog summaries

use std::{path::PathBuf, sync::Arc};

use serde_json::{Value, json};
use uuid::Uuid;

use crate::errors::StewardError;
use crate::exec::{CommandExecutor, ExecOptions};
use crate::plugins::{
    Plugin, ResourceDescriptor, ToolDescriptor, resource_text, text_content, text_result,
};
use crate::security::SnapshotStore;

/// Identifier for the built-in plugin in the registry.
pub const BUILTIN_PLUGIN_ID: &str = "system";

/// URI of the host metadata resource.
pub const SYSTEM_INFO_URI: &str = "steward://system/info";

/// URI of the snapshot catalog resource.
pub const SNAPSHOTS_URI: &str = "steward://snapshots";

/// Built-in plugin wiring the executor and snapshot store into the tool
/// surface.
pub struct SystemPlugin {
    executor: Arc<CommandExecutor>,
    snapshots: Arc<SnapshotStore>,
}

impl SystemPlugin {
    pub fn new(executor: Arc<CommandExecutor>, snapshots: Arc<SnapshotStore>) -> Self {
        Self {
            executor,
            snapshots,
        }
    }

    async fn run_command(&self, args: &Value) -> Result<Value, StewardError> {
        let command = args
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| StewardError::InvalidParams("Missing command".to_string()))?;
        let argv: Vec<String> = args
            .get("args")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let elevate = args
            .get("elevate")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let options = ExecOptions {
            timeout_ms: args.get("timeoutMs").and_then(Value::as_u64),
            ..Default::default()
        };

        let result = if elevate {
            self.executor
                .execute_with_elevation(command, &argv, options)
                .await?
        } else {
            self.executor.execute(command, &argv, options).await?
        };

        let mut content = vec![text_content(&result.stdout)];
        if !result.stderr.is_empty() {
            content.push(text_content(&result.stderr));
        }
        if let Some(error) = &result.error {
            content.push(text_content(error));
        }

        Ok(json!({
            "content": content,
            "isError": !result.success,
            "exitCode": result.exit_code,
            "durationMs": result.duration_ms,
            "timedOut": result.timed_out,
        }))
    }

    async fn create_snapshot(&self, args: &Value) -> Result<Value, StewardError> {
        let description = args
            .get("description")
            .and_then(Value::as_str)
            .ok_or_else(|| StewardError::InvalidParams("Missing description".to_string()))?;
        let paths: Vec<PathBuf> = args
            .get("paths")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(PathBuf::from)
                    .collect()
            })
            .unwrap_or_default();

        let id = self.snapshots.create_snapshot(description, &paths).await?;
        Ok(json!({
            "content": [text_content(format!("Snapshot created: {id}"))],
            "isError": false,
            "snapshotId": id,
        }))
    }

    async fn restore_snapshot(&self, args: &Value) -> Result<Value, StewardError> {
        let id = parse_snapshot_id(args)?;
        let report = self.snapshots.restore_snapshot(id).await?;
        Ok(json!({
            "content": [text_content(format!(
                "Snapshot {id} restored: {} files restored, {} failed, {} services converged",
                report.files_restored, report.files_failed, report.services_converged
            ))],
            "isError": false,
            "report": report,
        }))
    }

    async fn delete_snapshot(&self, args: &Value) -> Result<Value, StewardError> {
        let id = parse_snapshot_id(args)?;
        self.snapshots.delete_snapshot(id).await?;
        Ok(text_result(format!("Snapshot deleted: {id}")))
    }
}

fn parse_snapshot_id(args: &Value) -> Result<Uuid, StewardError> {
    let raw = args
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| StewardError::InvalidParams("Missing snapshot id".to_string()))?;
    Uuid::parse_str(raw)
        .map_err(|_| StewardError::InvalidParams(format!("Invalid snapshot id: {raw}")))
}

#[async_trait::async_trait]
impl Plugin for SystemPlugin {
    fn name(&self) -> &str {
        BUILTIN_PLUGIN_ID
    }

    fn tools(&self) -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor {
                name: "echo".to_string(),
                description: "Returns the input message as output.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "message": { "type": "string", "description": "Text to echo back" }
                    },
                    "required": ["message"]
                }),
            },
            ToolDescriptor {
                name: "run_command".to_string(),
                description: "Executes an allowlisted command on the host.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "command": { "type": "string", "description": "Bare command name" },
                        "args": { "type": "array", "description": "Command arguments" },
                        "timeoutMs": { "type": "integer", "minimum": 1000 },
                        "elevate": { "type": "boolean", "default": false }
                    },
                    "required": ["command"]
                }),
            },
            ToolDescriptor {
                name: "create_snapshot".to_string(),
                description: "Captures the given files and current service state into a snapshot."
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "description": { "type": "string" },
                        "paths": { "type": "array", "description": "Absolute file paths to capture" }
                    },
                    "required": ["description", "paths"]
                }),
            },
            ToolDescriptor {
                name: "restore_snapshot".to_string(),
                description: "Restores files and service state from a snapshot.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "description": "Snapshot id" }
                    },
                    "required": ["id"]
                }),
            },
            ToolDescriptor {
                name: "delete_snapshot".to_string(),
                description: "Deletes a snapshot record.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "description": "Snapshot id" }
                    },
                    "required": ["id"]
                }),
            },
        ]
    }

    fn resources(&self) -> Vec<ResourceDescriptor> {
        vec![
            ResourceDescriptor {
                uri: SYSTEM_INFO_URI.to_string(),
                name: "System information".to_string(),
                description: "Host metadata for the machine running the daemon".to_string(),
                mime_type: "application/json".to_string(),
            },
            ResourceDescriptor {
                uri: SNAPSHOTS_URI.to_string(),
                name: "Snapshots".to_string(),
                description: "Summaries of all snapshot records, newest first".to_string(),
                mime_type: "application/json".to_string(),
            },
        ]
    }

    async fn execute_tool(&self, name: &str, args: Value) -> Result<Value, StewardError> {
        match name {
            "echo" => {
                let message = args
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Ok(text_result(message))
            }
            "run_command" => self.run_command(&args).await,
            "create_snapshot" => self.create_snapshot(&args).await,
            "restore_snapshot" => self.restore_snapshot(&args).await,
            "delete_snapshot" => self.delete_snapshot(&args).await,
            other => Err(StewardError::internal(format!("Tool not found: {other}"))),
        }
    }

    async fn read_resource(&self, uri: &str) -> Result<Value, StewardError> {
        match uri {
            SYSTEM_INFO_URI => {
                let info = json!({
                    "hostname": std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string()),
                    "os": std::env::consts::OS,
                    "arch": std::env::consts::ARCH,
                    "pid": std::process::id(),
                    "version": env!("CARGO_PKG_VERSION"),
                });
                Ok(resource_text(
                    uri,
                    "application/json",
                    serde_json::to_string_pretty(&info)?,
                ))
            }
            SNAPSHOTS_URI => {
                let summaries = self.snapshots.list_snapshots().await?;
                Ok(resource_text(
                    uri,
                    "application/json",
                    serde_json::to_string_pretty(&summaries)?,
                ))
            }
            other => Err(StewardError::internal(format!(
                "Resource not found: {other}"
            ))),
        }
    }
}
