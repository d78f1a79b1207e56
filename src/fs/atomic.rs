//! Atomic file replacement for the telemetry tables.
//!
//! Every table save rewrites the whole JSON document, so a torn write would
//! corrupt the table for every later reader. Writes therefore go to a
//! temporary file in the target's directory, get synced, and are renamed
//! over the target. Concurrent writers still race whole documents against
//! each other (last writer wins), but a reader never sees half a write.
//!
//! The temporary file is named `.{filename}.tmp` next to the target; one may
//! be left behind after a crash and is overwritten by the next save.

use crate::error::{LockstatsError, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Atomically replace `path` with `content`.
///
/// Creates missing parent directories. The rename only works when the
/// staging file and the target are on the same filesystem, which holds
/// because both live in the state directory.
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            LockstatsError::StorageError(format!(
                "failed to create parent directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    let staging = staging_path(path)?;
    stage(&staging, content)?;
    promote(&staging, path)
}

/// String-content convenience wrapper over [`atomic_write`].
pub fn atomic_write_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    atomic_write(path, content.as_bytes())
}

fn staging_path(target: &Path) -> Result<PathBuf> {
    let name = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| LockstatsError::StorageError("invalid file path".to_string()))?;

    let parent = target.parent().unwrap_or(Path::new("."));
    Ok(parent.join(format!(".{}.tmp", name)))
}

/// Write the staging file and fsync it.
fn stage(staging: &Path, content: &[u8]) -> Result<()> {
    let result = File::create(staging)
        .map_err(|e| {
            LockstatsError::StorageError(format!(
                "failed to create staging file '{}': {}",
                staging.display(),
                e
            ))
        })
        .and_then(|mut file| {
            file.write_all(content)
                .and_then(|()| file.sync_all())
                .map_err(|e| {
                    LockstatsError::StorageError(format!(
                        "failed to write staging file '{}': {}",
                        staging.display(),
                        e
                    ))
                })
        });

    if result.is_err() {
        let _ = fs::remove_file(staging);
    }
    result
}

/// Move the staging file over the target.
#[cfg(unix)]
fn promote(staging: &Path, target: &Path) -> Result<()> {
    // rename() replaces the destination atomically on POSIX
    fs::rename(staging, target).map_err(|e| {
        let _ = fs::remove_file(staging);
        LockstatsError::StorageError(format!(
            "failed to replace '{}': {}",
            target.display(),
            e
        ))
    })?;

    // Persist the directory entry as well
    if let Some(parent) = target.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }

    Ok(())
}

/// Move the staging file over the target.
///
/// Windows rename() refuses to replace an existing file, so the target is
/// removed first. The gap between remove and rename is not atomic; the
/// tables tolerate it because a missing file reads as an empty table and
/// the next save rewrites the full document.
#[cfg(windows)]
fn promote(staging: &Path, target: &Path) -> Result<()> {
    if target.exists() {
        fs::remove_file(target).map_err(|e| {
            let _ = fs::remove_file(staging);
            LockstatsError::StorageError(format!(
                "failed to remove '{}' before replace: {}",
                target.display(),
                e
            ))
        })?;
    }

    fs::rename(staging, target).map_err(|e| {
        let _ = fs::remove_file(staging);
        LockstatsError::StorageError(format!(
            "failed to replace '{}': {}",
            target.display(),
            e
        ))
    })
}
