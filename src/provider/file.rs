//! File-backed lock provider.
//!
//! Locks are exclusive files under the state directory's `locks/` folder,
//! created with **create_new** semantics so only one process can hold a
//! given key at a time. Each file carries JSON metadata identifying the
//! holder and the grant's expiry; expired files may be reclaimed by any
//! later acquirer. Reclaim goes through a staged rename with a token
//! re-check, so contenders racing on the same expired file can never
//! remove a fresh grant that already took its place.

use super::types::{LockProvider, ProviderHandle};
use crate::context::TelemetryContext;
use crate::error::{LockstatsError, Result};
use crate::fs::atomic_write_file;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// How long to sleep between acquisition attempts while waiting.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Metadata stored in lock files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockFileMetadata {
    /// The resource key this lock is for.
    pub key: String,

    /// Owner of the grant (e.g., `user@HOST`).
    pub owner: String,

    /// Process id of the holder.
    pub pid: u32,

    /// Token identifying this specific grant.
    pub token: String,

    /// When the grant was taken (RFC3339).
    pub created_at: DateTime<Utc>,

    /// When the grant may be reclaimed by other acquirers.
    pub expires_at: DateTime<Utc>,
}

impl LockFileMetadata {
    /// Create metadata for a fresh grant with the current timestamp.
    fn new(key: &str, maxlifetime: Duration) -> Result<Self> {
        let created_at = Utc::now();
        let token = format!(
            "{}:{}",
            std::process::id(),
            created_at.timestamp_nanos_opt().unwrap_or_default()
        );

        Ok(Self {
            key: key.to_string(),
            owner: get_owner_string(),
            pid: std::process::id(),
            token,
            created_at,
            expires_at: created_at + lifetime_to_chrono(maxlifetime)?,
        })
    }

    /// Parse lock metadata from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            LockstatsError::LockError(format!(
                "failed to read lock file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            LockstatsError::LockError(format!(
                "failed to parse lock file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })
    }

    /// Serialize lock metadata to JSON string.
    fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            LockstatsError::LockError(format!("failed to serialize lock metadata: {}", e))
        })
    }

    /// Whether the grant's lifetime has run out.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// The bundled production lock provider.
#[derive(Debug, Clone)]
pub struct FileLockProvider {
    locks_dir: PathBuf,
}

impl FileLockProvider {
    /// Create a provider over the context's locks directory.
    pub fn new(ctx: &TelemetryContext) -> Self {
        Self {
            locks_dir: ctx.locks_dir.clone(),
        }
    }

    /// The lock file path for a resource key.
    pub fn lock_path(&self, resourcekey: &str) -> PathBuf {
        self.locks_dir
            .join(format!("{}.lock", encode_key_filename(resourcekey)))
    }

    fn ensure_locks_dir(&self) -> Result<()> {
        if !self.locks_dir.exists() {
            fs::create_dir_all(&self.locks_dir).map_err(|e| {
                LockstatsError::LockError(format!(
                    "failed to create locks directory '{}': {}",
                    self.locks_dir.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Try to create the lock file exclusively.
    ///
    /// Returns false when another holder already has the file.
    fn try_create(&self, lock_path: &Path, metadata: &LockFileMetadata) -> Result<bool> {
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(lock_path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => {
                return Err(LockstatsError::LockError(format!(
                    "failed to create lock file '{}': {}",
                    lock_path.display(),
                    e
                )));
            }
        };

        let json = metadata.to_json()?;
        file.write_all(json.as_bytes()).map_err(|e| {
            let _ = fs::remove_file(lock_path);
            LockstatsError::LockError(format!("failed to write lock metadata: {}", e))
        })?;

        file.sync_all().map_err(|e| {
            let _ = fs::remove_file(lock_path);
            LockstatsError::LockError(format!("failed to sync lock file: {}", e))
        })?;

        Ok(true)
    }

    /// Evict the expired grant `stale` so the acquire loop can retry.
    ///
    /// The lock file is claimed by renaming it onto a path private to this
    /// attempt; only one contender can win that rename. The moved file's
    /// token is then checked against `stale`, which catches an expired
    /// grant that was already replaced by a fresh one after the caller's
    /// read; the fresh grant goes back on the canonical path untouched.
    ///
    /// Returns true when the expired file is gone and `create_new` is
    /// worth retrying immediately.
    pub(crate) fn evict_expired(&self, resourcekey: &str, stale: &LockFileMetadata) -> bool {
        let lock_path = self.lock_path(resourcekey);
        let staged = self.eviction_path(resourcekey);

        if fs::rename(&lock_path, &staged).is_err() {
            // Another contender evicted it first, or the holder released
            return false;
        }

        match LockFileMetadata::from_file(&staged) {
            Ok(moved) if moved.token == stale.token => {
                let _ = fs::remove_file(&staged);
                true
            }
            _ => {
                restore_grant(&staged, &lock_path);
                false
            }
        }
    }

    /// Rename target private to one eviction attempt.
    ///
    /// Never ends in `.lock`, so it cannot collide with any key's lock
    /// file.
    fn eviction_path(&self, resourcekey: &str) -> PathBuf {
        self.locks_dir.join(format!(
            "{}.evict-{}-{}",
            encode_key_filename(resourcekey),
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ))
    }
}

impl LockProvider for FileLockProvider {
    fn acquire(
        &self,
        resourcekey: &str,
        timeout: Duration,
        maxlifetime: Duration,
    ) -> Result<Option<ProviderHandle>> {
        self.ensure_locks_dir()?;

        let lock_path = self.lock_path(resourcekey);
        let deadline = Instant::now() + timeout;

        loop {
            let metadata = LockFileMetadata::new(resourcekey, maxlifetime)?;
            if self.try_create(&lock_path, &metadata)? {
                return Ok(Some(ProviderHandle {
                    resourcekey: resourcekey.to_string(),
                    token: metadata.token,
                }));
            }

            // The holder may have outlived its grant; evict and retry.
            // A lost eviction race falls through to the deadline check and
            // polls again.
            if let Ok(existing) = LockFileMetadata::from_file(&lock_path)
                && existing.is_expired(Utc::now())
                && self.evict_expired(resourcekey, &existing)
            {
                continue;
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            std::thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }

    fn release(&self, handle: &ProviderHandle) -> Result<bool> {
        let lock_path = self.lock_path(&handle.resourcekey);

        // Token check: a reclaimed or force-released grant is someone
        // else's file now
        match LockFileMetadata::from_file(&lock_path) {
            Ok(metadata) if metadata.token == handle.token => {
                fs::remove_file(&lock_path).map_err(|e| {
                    LockstatsError::LockError(format!(
                        "failed to remove lock file '{}': {}",
                        lock_path.display(),
                        e
                    ))
                })?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn extend(&self, handle: &ProviderHandle, maxlifetime: Duration) -> Result<bool> {
        let lock_path = self.lock_path(&handle.resourcekey);

        match LockFileMetadata::from_file(&lock_path) {
            Ok(mut metadata) if metadata.token == handle.token => {
                metadata.expires_at = Utc::now() + lifetime_to_chrono(maxlifetime)?;
                atomic_write_file(&lock_path, &metadata.to_json()?)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn force_release(&self, resourcekey: &str) -> Result<Option<String>> {
        let lock_path = self.lock_path(resourcekey);
        if !lock_path.exists() {
            return Ok(None);
        }

        let owner = LockFileMetadata::from_file(&lock_path)
            .map(|m| m.owner)
            .unwrap_or_else(|_| "unknown".to_string());

        fs::remove_file(&lock_path).map_err(|e| {
            LockstatsError::LockError(format!(
                "failed to remove lock file '{}': {}",
                lock_path.display(),
                e
            ))
        })?;

        Ok(Some(owner))
    }

    fn supports_timeout(&self) -> bool {
        true
    }

    fn supports_recursion(&self) -> bool {
        false
    }

    fn supports_auto_release(&self) -> bool {
        false
    }

    fn is_available(&self) -> bool {
        self.locks_dir.is_dir() || fs::create_dir_all(&self.locks_dir).is_ok()
    }
}

/// Encode a resource key into a safe lock filename.
///
/// Every byte outside `[A-Za-z0-9._-]` is percent-escaped, so the encoding
/// is lossless and distinct keys never collide.
pub(crate) fn encode_key_filename(resourcekey: &str) -> String {
    let mut encoded = String::with_capacity(resourcekey.len());
    for &byte in resourcekey.as_bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => {
                encoded.push(byte as char);
            }
            _ => {
                encoded.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    encoded
}

/// Put a mistakenly evicted live grant back on the canonical path.
///
/// `hard_link` refuses to clobber: when a third acquirer claimed the key
/// during the eviction window its grant stays, and the displaced file is
/// dropped; the displaced holder's token no longer matches the canonical
/// file.
fn restore_grant(staged: &Path, lock_path: &Path) {
    match fs::hard_link(staged, lock_path) {
        Ok(()) => {
            let _ = fs::remove_file(staged);
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            let _ = fs::remove_file(staged);
        }
        Err(_) => {
            // Filesystem without hard links; plain rename is the fallback
            let _ = fs::rename(staged, lock_path);
        }
    }
}

/// Get the owner string for lock metadata.
pub(crate) fn get_owner_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}

fn lifetime_to_chrono(maxlifetime: Duration) -> Result<chrono::Duration> {
    chrono::Duration::from_std(maxlifetime)
        .map_err(|_| LockstatsError::LockError("lock lifetime out of range".to_string()))
}
