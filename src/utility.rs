//! Secure filesystem helpers.
//!
//! The helpers in this module restrict files and directories to the
//! current user (owner) only, using POSIX file modes. They operate on
//! existing paths and return an error when the target does not exist;
//! callers create first, then harden.

use anyhow::{Context, Result};
use std::path::Path;

#[cfg(unix)]
use std::{fs, os::unix::fs::PermissionsExt};

/// Ensure the directory at `dir_path` is accessible only by the current
/// user (mode 0700).
pub fn set_secure_dir_permissions(dir_path: &Path) -> Result<()> {
    if !dir_path.exists() {
        return Err(anyhow::anyhow!(
            "directory does not exist: {}",
            dir_path.display()
        ));
    }

    #[cfg(unix)]
    {
        let metadata = fs::metadata(dir_path)
            .with_context(|| format!("reading metadata for {}", dir_path.display()))?;
        let mut permissions = metadata.permissions();
        permissions.set_mode(0o700);
        fs::set_permissions(dir_path, permissions)
            .with_context(|| format!("setting unix permissions on {}", dir_path.display()))?;
        tracing::debug!(
            "Set directory permissions to 0700 for: {}",
            dir_path.display()
        );
    }

    Ok(())
}

/// Ensure the file at `file_path` is readable and writable only by the
/// current user (mode 0600).
pub fn set_secure_file_permissions(file_path: &Path) -> Result<()> {
    if !file_path.exists() {
        return Err(anyhow::anyhow!(
            "file does not exist: {}",
            file_path.display()
        ));
    }

    #[cfg(unix)]
    {
        let metadata = fs::metadata(file_path)
            .with_context(|| format!("reading metadata for {}", file_path.display()))?;
        let mut permissions = metadata.permissions();
        permissions.set_mode(0o600);
        fs::set_permissions(file_path, permissions)
            .with_context(|| format!("setting unix permissions on {}", file_path.display()))?;
        tracing::debug!("Set file permissions to 0600 for: {}", file_path.display());
    }

    Ok(())
}
