// src/install/backup.rs

//! Exclude-aware backup staging for update steps.
//!
//! Before a manifest is applied, the managed files of the install root are
//! copied into a per-step backup directory. Excluded (permanent/user)
//! paths are never copied: they are never touched by an update, so they
//! must not be touched by a restore either. This bounds backup size and
//! guarantees user data survives both directions.

use crate::error::Result;
use crate::fsutil::ExcludeMatcher;
use crate::release::Manifest;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Copy the managed files of `root` into `backup_dir`, skipping excluded
/// paths. Returns the number of files backed up.
pub fn create_backup(root: &Path, backup_dir: &Path, excludes: &ExcludeMatcher) -> Result<usize> {
    fs::create_dir_all(backup_dir)?;
    let mut count = 0usize;

    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.map_err(|e| std::io::Error::other(e))?;
        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(std::io::Error::other)?;
        let rel_str = rel.to_string_lossy().replace('\\', "/");

        if excludes.is_excluded(&rel_str) {
            debug!(path = %rel_str, "skipping excluded path in backup");
            continue;
        }

        let dest = backup_dir.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &dest)?;
            count += 1;
        }
        // Symlinks and special files are not part of a managed codebase;
        // leave them alone.
    }

    info!(
        root = %root.display(),
        backup = %backup_dir.display(),
        files = count,
        "created backup staging"
    );
    Ok(count)
}

/// Restore the install root's managed files from a step backup.
///
/// Files the failed manifest added that have no backup counterpart are
/// removed first, then every backed-up file is copied back. Excluded
/// paths never appear in the backup, so user data is untouched.
pub fn restore_backup(
    root: &Path,
    backup_dir: &Path,
    failed_manifest: &Manifest,
    excludes: &ExcludeMatcher,
) -> Result<usize> {
    // Remove newly added files with no pre-step counterpart.
    for rel_path in &failed_manifest.files_add {
        if excludes.is_excluded(rel_path) {
            continue;
        }
        let backup_path = backup_dir.join(rel_path);
        if backup_path.exists() {
            continue;
        }
        let target = root.join(rel_path);
        if target.exists() {
            if let Err(e) = fs::remove_file(&target) {
                warn!(path = %rel_path, error = %e, "failed to remove added file during restore");
            }
        }
    }

    // Copy every backed-up file back over the install root.
    let mut count = 0usize;
    for entry in WalkDir::new(backup_dir).min_depth(1) {
        let entry = entry.map_err(|e| std::io::Error::other(e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(backup_dir)
            .map_err(std::io::Error::other)?;
        let dest = root.join(rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(entry.path(), &dest)?;
        count += 1;
    }

    info!(
        root = %root.display(),
        files = count,
        "restored managed files from backup staging"
    );
    Ok(count)
}
