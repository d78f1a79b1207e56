//! Environment-identity guard for lockstats.
//!
//! A state directory copied from another deployment (staging cloned to prod,
//! or the reverse) carries current-table rows whose hosts and pids do not
//! exist here, and they would sit forever as phantom stale locks. The guard
//! runs once at proxy construction: it compares the persisted environment
//! identity (the base URL) against the configured one and, on divergence,
//! purges the current table and persists the new identity. History rows and
//! the row-id counter are never touched.

use crate::config::Config;
use crate::context::TelemetryContext;
use crate::error::{LockstatsError, Result};
use crate::events::{Event, EventAction, append_event};
use crate::fs::atomic_write_file;
use crate::store::CurrentTable;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs;

/// Persisted environment identity (`environment.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentIdentity {
    /// The deployment's base URL as of the last proxy construction.
    pub base_url: String,
}

impl EnvironmentIdentity {
    /// Load the persisted identity, or `None` when none has been recorded.
    pub fn load(ctx: &TelemetryContext) -> Result<Option<Self>> {
        let path = ctx.environment_path();
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|e| {
            LockstatsError::StorageError(format!(
                "failed to read environment identity '{}': {}",
                path.display(),
                e
            ))
        })?;

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| {
                LockstatsError::StorageError(format!(
                    "failed to parse environment identity '{}': {}",
                    path.display(),
                    e
                ))
            })
    }

    /// Persist this identity.
    pub fn save(&self, ctx: &TelemetryContext) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            LockstatsError::StorageError(format!(
                "failed to serialize environment identity: {}",
                e
            ))
        })?;

        atomic_write_file(ctx.environment_path(), &json)
    }
}

/// Reconcile the persisted environment identity with the configured one.
///
/// On mismatch the current table is emptied and the new identity persisted;
/// returns true when that purge happened. A missing identity file records
/// the configured identity without purging anything.
pub fn ensure_consistent(
    ctx: &TelemetryContext,
    config: &Config,
    current: &CurrentTable,
) -> Result<bool> {
    let live = config.base_url.as_str();

    let persisted = match EnvironmentIdentity::load(ctx)? {
        Some(identity) => identity,
        None => {
            // First run in this environment: nothing to invalidate
            EnvironmentIdentity {
                base_url: live.to_string(),
            }
            .save(ctx)?;
            return Ok(false);
        }
    };

    if persisted.base_url == live {
        return Ok(false);
    }

    // Purge before persisting the new identity: a crash in between repeats
    // the purge on the next run instead of skipping it
    let purged = current.clear_all()?;
    EnvironmentIdentity {
        base_url: live.to_string(),
    }
    .save(ctx)?;

    if config.debug {
        eprintln!(
            "lockstats [environment purge]: {} row(s) cleared after identity change",
            purged
        );
    }

    let event = Event::new(EventAction::EnvironmentPurge).with_details(json!({
        "old_base_url": persisted.base_url,
        "new_base_url": live,
        "purged_rows": purged,
    }));
    if let Err(e) = append_event(ctx, &event) {
        eprintln!("Warning: failed to log environment_purge event: {}", e);
    }

    Ok(true)
}
