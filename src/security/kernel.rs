//! Concurrency admission and audit bracketing for mutating operations.
//!
//! The kernel wraps every dispatched handler exactly once at the protocol
//! boundary. Admission is a counting semaphore that never queues: when all
//! slots are occupied the call fails immediately with the resource-locked
//! error and the client is expected to retry with its own backoff.

use std::{
    collections::HashMap,
    sync::Mutex,
    time::Instant,
};

use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::debug;
use uuid::Uuid;

use crate::errors::StewardError;
use crate::security::audit::{AuditEvent, AuditLog};

/// Ephemeral record of one admitted operation.
#[derive(Debug)]
pub struct OperationRecord {
    pub operation_type: String,
    pub context: Value,
    pub started: Instant,
}

/// Gate through which all mutating plugin actions pass.
pub struct SecurityKernel {
    semaphore: Semaphore,
    audit: AuditLog,
    /// In-flight operations keyed by id; entries live from admission to
    /// completion or cancellation.
    operations: Mutex<HashMap<Uuid, OperationRecord>>,
}

impl std::fmt::Debug for SecurityKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityKernel")
            .field("available_permits", &self.semaphore.available_permits())
            .finish()
    }
}

impl SecurityKernel {
    /// Kernel with `max_concurrent` admission slots.
    pub fn new(max_concurrent: usize, audit: AuditLog) -> Self {
        Self {
            semaphore: Semaphore::new(max_concurrent.max(1)),
            audit,
            operations: Mutex::new(HashMap::new()),
        }
    }

    /// Number of operations currently admitted.
    pub fn in_flight(&self) -> usize {
        self.operations
            .lock()
            .expect("operation table lock poisoned")
            .len()
    }

    /// Run `operation` under admission control with audit bracketing.
    ///
    /// The underlying error is re-raised unchanged; the operation record
    /// and the admission slot are released on every exit path.
    pub async fn execute_with_audit<T, F, Fut>(
        &self,
        operation_type: &str,
        context: Value,
        operation: F,
    ) -> Result<T, StewardError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, StewardError>>,
    {
        // Saturation fails immediately; the kernel does not queue.
        let _permit = self
            .semaphore
            .try_acquire()
            .map_err(|_| StewardError::ResourceLocked)?;

        let id = Uuid::new_v4();
        let started = Instant::now();
        self.operations
            .lock()
            .expect("operation table lock poisoned")
            .insert(
                id,
                OperationRecord {
                    operation_type: operation_type.to_string(),
                    context: context.clone(),
                    started,
                },
            );

        self.audit.emit(&AuditEvent::new(
            "operation_start",
            id,
            operation_type,
            context.clone(),
        ));
        debug!(operation_id = %id, operation = operation_type, "Operation admitted");

        let result = operation().await;

        let duration_ms = started.elapsed().as_millis() as u64;
        self.operations
            .lock()
            .expect("operation table lock poisoned")
            .remove(&id);

        let mut event = match &result {
            Ok(_) => AuditEvent::new("operation_success", id, operation_type, context),
            Err(e) => {
                let mut ev = AuditEvent::new("operation_failure", id, operation_type, context);
                ev.error = Some(e.to_string());
                ev
            }
        };
        event.duration_ms = Some(duration_ms);
        self.audit.emit(&event);

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kernel(slots: usize) -> SecurityKernel {
        SecurityKernel::new(slots, AuditLog::new(false))
    }

    #[tokio::test]
    async fn successful_operation_releases_record() {
        let k = kernel(2);
        let out = k
            .execute_with_audit("test_op", json!({}), || async { Ok::<_, StewardError>(42) })
            .await
            .unwrap();
        assert_eq!(out, 42);
        assert_eq!(k.in_flight(), 0);
    }

    #[tokio::test]
    async fn failure_is_reraised_unchanged_and_record_released() {
        let k = kernel(2);
        let err = k
            .execute_with_audit("test_op", json!({}), || async {
                Err::<(), _>(StewardError::internal("boom"))
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(k.in_flight(), 0);
    }

    #[tokio::test]
    async fn saturated_semaphore_fails_immediately() {
        let k = std::sync::Arc::new(kernel(1));
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let k2 = k.clone();
        let long_running = tokio::spawn(async move {
            k2.execute_with_audit("slow", json!({}), || async {
                release_rx.await.ok();
                Ok::<_, StewardError>(())
            })
            .await
        });

        // Wait for the first operation to be admitted.
        while k.in_flight() == 0 {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }

        let err = k
            .execute_with_audit("second", json!({}), || async { Ok::<_, StewardError>(()) })
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::errors::RESOURCE_LOCKED);

        release_tx.send(()).unwrap();
        long_running.await.unwrap().unwrap();
        assert_eq!(k.in_flight(), 0);
    }
}
