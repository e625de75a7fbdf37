//! Structured audit event emission.
//!
//! Audit events are emitted on the dedicated `steward::audit` tracing
//! target so the logging setup can route them to the daily audit file,
//! separate from application logs. Context payloads are echoed verbatim;
//! the kernel does not redact caller-supplied data.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Tracing target carrying audit events.
pub const AUDIT_TARGET: &str = "steward::audit";

/// One audit record: start, success or failure of an admitted operation,
/// or a standalone event such as a snapshot deletion.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    /// Event name (`operation_start`, `operation_success`,
    /// `operation_failure`, `snapshot_deleted`, ...).
    pub event: String,
    /// Operation id, shared across the start/terminal pair.
    pub operation_id: Uuid,
    /// Operation type supplied by the caller.
    pub operation: String,
    /// Caller-supplied context, echoed verbatim.
    pub context: Value,
    /// Duration in milliseconds; present on terminal events only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Failure message; present on `operation_failure` only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    /// Event with no duration/error yet (operation start or standalone).
    pub fn new(event: impl Into<String>, operation_id: Uuid, operation: impl Into<String>, context: Value) -> Self {
        Self {
            event: event.into(),
            operation_id,
            operation: operation.into(),
            context,
            duration_ms: None,
            error: None,
            timestamp: Utc::now(),
        }
    }
}

/// Audit sink writing through the tracing infrastructure.
///
/// When auditing is disabled in configuration, `emit` is a no-op; the
/// kernel still tracks operations, it just does not persist the events.
#[derive(Debug, Clone)]
pub struct AuditLog {
    enabled: bool,
}

impl AuditLog {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Write one event to the audit target.
    pub fn emit(&self, event: &AuditEvent) {
        if !self.enabled {
            return;
        }
        match serde_json::to_string(event) {
            Ok(json) => tracing::info!(target: "steward::audit", "{json}"),
            Err(e) => tracing::warn!("Failed to serialize audit event: {e}"),
        }
    }

    /// Emit a standalone named event with free-form details.
    pub fn record(&self, name: &str, details: Value) {
        self.emit(&AuditEvent::new(name, Uuid::new_v4(), name, details));
    }
}
