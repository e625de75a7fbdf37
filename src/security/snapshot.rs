//! Durable snapshot store for file and service state.
//!
//! A snapshot is an immutable bundle of file contents (with mode bits and
//! timestamps) and service states, captured at a moment in time and
//! persisted as a single self-contained JSON record named by its UUID.
//! Records are written atomically (temporary sibling, then rename) so a
//! partial record never appears at the final name.
//!
//! Restoration is deliberately best-effort per entry: when files have
//! diverged, restoring the rest is preferable to failing fast. Per-entry
//! failures are audited and the next entry is attempted.

use std::{path::{Path, PathBuf}, sync::Arc};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::StewardError;
use crate::security::audit::AuditLog;

/// Captured state of a single file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    /// Absolute path at capture time.
    pub path: PathBuf,
    /// File bytes, base64-encoded so binary content survives JSON.
    pub contents: String,
    /// Permission bits at capture time.
    pub mode: u32,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

/// Captured state of a single service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub name: String,
    /// Whether the service was enabled at capture.
    pub enabled: bool,
    /// Whether the service was active at capture.
    pub active: bool,
}

/// Host metadata stamped into every record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostInfo {
    pub hostname: String,
    pub os: String,
    pub arch: String,
}

impl HostInfo {
    fn current() -> Self {
        Self {
            hostname: std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string()),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }
}

/// Complete, self-contained snapshot record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub id: Uuid,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub host: HostInfo,
    pub files: Vec<FileEntry>,
    pub services: Vec<ServiceEntry>,
}

/// Summary returned by `list_snapshots`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub id: Uuid,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub file_count: usize,
    pub service_count: usize,
}

/// Outcome of a restore pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RestoreReport {
    pub files_restored: usize,
    pub files_failed: usize,
    pub services_converged: usize,
}

/// Collaborator capturing and converging service state.
#[async_trait::async_trait]
pub trait ServiceStateProvider: Send + Sync {
    /// Current state of the services this provider manages.
    async fn capture(&self) -> Result<Vec<ServiceEntry>, StewardError>;

    /// Request transitions so the named service converges to `entry`.
    async fn apply(&self, entry: &ServiceEntry) -> Result<(), StewardError>;
}

/// Provider used when no service manager integration is configured.
#[derive(Debug, Default)]
pub struct NullServiceState;

#[async_trait::async_trait]
impl ServiceStateProvider for NullServiceState {
    async fn capture(&self) -> Result<Vec<ServiceEntry>, StewardError> {
        Ok(Vec::new())
    }

    async fn apply(&self, _entry: &ServiceEntry) -> Result<(), StewardError> {
        Ok(())
    }
}

/// Append-only catalog of snapshot records under a single directory.
pub struct SnapshotStore {
    dir: PathBuf,
    provider: Arc<dyn ServiceStateProvider>,
    audit: AuditLog,
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("dir", &self.dir)
            .finish()
    }
}

impl SnapshotStore {
    /// Open (creating if needed) the snapshot directory.
    pub async fn new(
        dir: impl Into<PathBuf>,
        provider: Arc<dyn ServiceStateProvider>,
        audit: AuditLog,
    ) -> Result<Self, StewardError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        // Snapshots carry raw file contents of system configuration;
        // the directory must not be world-readable.
        if let Err(e) = crate::utility::set_secure_dir_permissions(&dir) {
            warn!(dir = %dir.display(), error = %e, "Could not harden snapshot directory");
        }
        Ok(Self {
            dir,
            provider,
            audit,
        })
    }

    /// Capture the given paths and the provider's service state into a new
    /// immutable record. Paths that do not exist are skipped.
    ///
    /// Returns the new snapshot id.
    pub async fn create_snapshot(
        &self,
        description: &str,
        file_paths: &[PathBuf],
    ) -> Result<Uuid, StewardError> {
        let mut files = Vec::new();
        for path in file_paths {
            if !path.exists() {
                debug!(path = %path.display(), "Skipping missing path during capture");
                continue;
            }
            match capture_file(path).await {
                Ok(entry) => files.push(entry),
                Err(e) => {
                    return Err(StewardError::internal(format!(
                        "Failed to capture {}: {e}",
                        path.display()
                    )));
                }
            }
        }

        let services = self.provider.capture().await?;
        let record = SnapshotRecord {
            id: Uuid::new_v4(),
            description: description.to_string(),
            created_at: Utc::now(),
            host: HostInfo::current(),
            files,
            services,
        };

        self.write_record(&record).await?;

        info!(
            id = %record.id,
            files = record.files.len(),
            services = record.services.len(),
            "Snapshot created"
        );
        self.audit.record(
            "snapshot_created",
            json!({
                "snapshot_id": record.id,
                "description": record.description,
                "file_count": record.files.len(),
                "service_count": record.services.len(),
            }),
        );

        Ok(record.id)
    }

    /// Restore a snapshot by id.
    ///
    /// File restoration is best-effort per entry; service state is
    /// converged toward the recorded state through the provider. The call
    /// succeeds if the record could be read, and the report carries the
    /// per-entry outcome.
    pub async fn restore_snapshot(&self, id: Uuid) -> Result<RestoreReport, StewardError> {
        let record = self.read_record(id).await?;
        let mut report = RestoreReport::default();

        for entry in &record.files {
            match restore_file(entry).await {
                Ok(()) => report.files_restored += 1,
                Err(e) => {
                    report.files_failed += 1;
                    warn!(path = %entry.path.display(), error = %e, "File restore failed");
                    self.audit.record(
                        "snapshot_restore_entry_failed",
                        json!({
                            "snapshot_id": id,
                            "path": entry.path,
                            "error": e.to_string(),
                        }),
                    );
                }
            }
        }

        // Best-effort from here on: a capture failure means every
        // recorded entry looks diverged and convergence is attempted for
        // all of them.
        let current = match self.provider.capture().await {
            Ok(current) => current,
            Err(e) => {
                warn!(error = %e, "Service state capture failed during restore");
                Vec::new()
            }
        };
        for recorded in &record.services {
            let diverged = current
                .iter()
                .find(|c| c.name == recorded.name)
                .map(|c| c != recorded)
                .unwrap_or(true);
            if diverged {
                match self.provider.apply(recorded).await {
                    Ok(()) => report.services_converged += 1,
                    Err(e) => {
                        warn!(service = %recorded.name, error = %e, "Service restore failed");
                        self.audit.record(
                            "snapshot_restore_entry_failed",
                            json!({
                                "snapshot_id": id,
                                "service": recorded.name,
                                "error": e.to_string(),
                            }),
                        );
                    }
                }
            }
        }

        info!(
            id = %id,
            restored = report.files_restored,
            failed = report.files_failed,
            "Snapshot restored"
        );
        self.audit.record(
            "snapshot_restored",
            json!({
                "snapshot_id": id,
                "files_restored": report.files_restored,
                "files_failed": report.files_failed,
                "services_converged": report.services_converged,
            }),
        );

        Ok(report)
    }

    /// Summaries of all records, newest first.
    pub async fn list_snapshots(&self) -> Result<Vec<SnapshotSummary>, StewardError> {
        let mut summaries = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_record_file(&path).await {
                Ok(record) => summaries.push(SnapshotSummary {
                    id: record.id,
                    description: record.description,
                    created_at: record.created_at,
                    file_count: record.files.len(),
                    service_count: record.services.len(),
                }),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable record"),
            }
        }

        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    /// Delete a record file. A deleted id cannot be restored.
    pub async fn delete_snapshot(&self, id: Uuid) -> Result<(), StewardError> {
        let path = self.record_path(id);
        if !path.exists() {
            return Err(StewardError::internal(format!("Snapshot not found: {id}")));
        }
        tokio::fs::remove_file(&path).await?;

        info!(id = %id, "Snapshot deleted");
        self.audit
            .record("snapshot_deleted", json!({ "snapshot_id": id }));
        Ok(())
    }

    /// Read the complete record for an id.
    pub async fn read_record(&self, id: Uuid) -> Result<SnapshotRecord, StewardError> {
        let path = self.record_path(id);
        if !path.exists() {
            return Err(StewardError::internal(format!("Snapshot not found: {id}")));
        }
        read_record_file(&path).await
    }

    fn record_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Write the record to a sibling temporary file, then rename. A
    /// partial record never appears at the final name.
    async fn write_record(&self, record: &SnapshotRecord) -> Result<(), StewardError> {
        let final_path = self.record_path(record.id);
        let tmp_path = self.dir.join(format!("{}.json.tmp", record.id));

        let bytes = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, &final_path).await?;
        Ok(())
    }
}

/// Capture one file's bytes, mode, size and mtime.
async fn capture_file(path: &Path) -> Result<FileEntry, StewardError> {
    let bytes = tokio::fs::read(path).await?;
    let metadata = tokio::fs::metadata(path).await?;
    let modified = metadata
        .modified()
        .ok()
        .map(DateTime::<Utc>::from);

    Ok(FileEntry {
        path: path.to_path_buf(),
        contents: BASE64.encode(&bytes),
        mode: file_mode(&metadata),
        size: metadata.len(),
        modified,
    })
}

/// Write one entry's bytes back and reapply its recorded mode.
async fn restore_file(entry: &FileEntry) -> Result<(), StewardError> {
    if let Some(parent) = entry.path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let bytes = BASE64
        .decode(&entry.contents)
        .map_err(|e| StewardError::internal(format!("Corrupt snapshot entry: {e}")))?;
    tokio::fs::write(&entry.path, &bytes).await?;
    apply_mode(&entry.path, entry.mode).await?;
    Ok(())
}

async fn read_record_file(path: &Path) -> Result<SnapshotRecord, StewardError> {
    let bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(unix)]
fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(_metadata: &std::fs::Metadata) -> u32 {
    0o644
}

#[cfg(unix)]
async fn apply_mode(path: &Path, mode: u32) -> Result<(), StewardError> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn apply_mode(_path: &Path, _mode: u32) -> Result<(), StewardError> {
    Ok(())
}
