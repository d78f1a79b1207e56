//! The current-state table: one row per resource key.
//!
//! Rows are upserted on every grant and marked released in place. The table
//! is a shared, best-effort side log: mutations are load, modify, atomic
//! write of the whole document, last writer wins.

use crate::context::TelemetryContext;
use crate::error::{LockstatsError, Result};
use crate::fs::atomic_write_file;
use crate::registry::TaskIdentity;
use crate::store::types::LockEpisode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

fn default_next_id() -> u64 {
    1
}

/// Persisted document backing the current-state table.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CurrentDoc {
    /// Monotonic row-id counter. Survives purges and resets so history
    /// back-references are never reused.
    #[serde(default = "default_next_id")]
    next_id: u64,

    #[serde(default)]
    rows: Vec<LockEpisode>,
}

impl Default for CurrentDoc {
    fn default() -> Self {
        Self {
            next_id: 1,
            rows: Vec::new(),
        }
    }
}

/// Handle on the persisted current-state table.
#[derive(Debug, Clone)]
pub struct CurrentTable {
    path: PathBuf,
}

impl CurrentTable {
    /// Create a table handle for the context's current-table path.
    pub fn new(ctx: &TelemetryContext) -> Self {
        Self {
            path: ctx.current_table_path(),
        }
    }

    fn load(&self) -> Result<CurrentDoc> {
        if !self.path.exists() {
            return Ok(CurrentDoc::default());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            LockstatsError::StorageError(format!(
                "failed to read current table '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            LockstatsError::StorageError(format!(
                "failed to parse current table '{}': {}",
                self.path.display(),
                e
            ))
        })
    }

    fn save(&self, doc: &CurrentDoc) -> Result<()> {
        let json = serde_json::to_string_pretty(doc).map_err(|e| {
            LockstatsError::StorageError(format!("failed to serialize current table: {}", e))
        })?;

        atomic_write_file(&self.path, &json)
    }

    /// Record a successful grant for `resourcekey`.
    ///
    /// An existing row for the key is updated in place: `gained` reset,
    /// `released` cleared, host/pid refreshed and the identity re-resolved.
    /// The row id stays stable across re-acquisitions.
    pub fn upsert_gain(
        &self,
        resourcekey: &str,
        identity: &TaskIdentity,
        now: DateTime<Utc>,
    ) -> Result<LockEpisode> {
        let mut doc = self.load()?;

        let latency = identity
            .enqueued_at
            .map(|enqueued| now.signed_duration_since(enqueued).num_seconds());

        let episode = match doc.rows.iter_mut().find(|row| row.resourcekey == resourcekey) {
            Some(row) => {
                row.host = local_hostname();
                row.pid = std::process::id();
                row.gained = now;
                row.released = None;
                row.duration = None;
                row.kind = identity.kind;
                row.classname = identity.classname.clone();
                row.component = identity.component.clone();
                row.customdata = identity.customdata.clone();
                row.latency = latency;
                row.clone()
            }
            None => {
                let row = LockEpisode {
                    id: doc.next_id,
                    resourcekey: resourcekey.to_string(),
                    host: local_hostname(),
                    pid: std::process::id(),
                    gained: now,
                    released: None,
                    duration: None,
                    kind: identity.kind,
                    classname: identity.classname.clone(),
                    component: identity.component.clone(),
                    customdata: identity.customdata.clone(),
                    latency,
                };
                doc.next_id += 1;
                doc.rows.push(row.clone());
                row
            }
        };

        self.save(&doc)?;
        Ok(episode)
    }

    /// Mark the episode for `resourcekey` released.
    ///
    /// Returns the completed episode. When no row exists for the key or the
    /// row is already released, returns `None` and mutates nothing.
    pub fn mark_released(
        &self,
        resourcekey: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<LockEpisode>> {
        let mut doc = self.load()?;

        let Some(row) = doc.rows.iter_mut().find(|row| row.resourcekey == resourcekey) else {
            return Ok(None);
        };
        if row.released.is_some() {
            return Ok(None);
        }

        row.released = Some(now);
        row.duration = Some(now.signed_duration_since(row.gained).num_seconds());
        let episode = row.clone();

        self.save(&doc)?;
        Ok(Some(episode))
    }

    /// All open rows, ordered oldest grant first.
    pub fn list_open(&self) -> Result<Vec<LockEpisode>> {
        let doc = self.load()?;

        let mut open: Vec<LockEpisode> = doc.rows.into_iter().filter(|r| r.is_open()).collect();
        open.sort_by_key(|r| r.gained);
        Ok(open)
    }

    /// All rows, open or released, in insertion order.
    pub fn all(&self) -> Result<Vec<LockEpisode>> {
        Ok(self.load()?.rows)
    }

    /// Delete every row, preserving the id counter.
    ///
    /// Returns the number of rows removed.
    pub fn clear_all(&self) -> Result<usize> {
        let mut doc = self.load()?;

        let removed = doc.rows.len();
        doc.rows.clear();
        self.save(&doc)?;
        Ok(removed)
    }
}

fn local_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}
