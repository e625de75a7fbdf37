//! Security kernel, audit sink and snapshot substrate.
//!
//! Every mutating plugin action passes through the kernel in
//! [`kernel`], which gates it on the admission semaphore and brackets it
//! with audit events. The [`snapshot`] module provides the durable
//! checkpoint store that guards mutating operations with a rollback path.

pub mod audit;
pub mod kernel;
pub mod snapshot;

pub use audit::{AUDIT_TARGET, AuditEvent, AuditLog};
pub use kernel::SecurityKernel;
pub use snapshot::{ServiceEntry, ServiceStateProvider, SnapshotStore};
