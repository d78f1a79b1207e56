//! Operator audit log for lockstats.
//!
//! Destructive operator actions (force release, reset, environment purge,
//! history cleanup) append one JSON object per line to
//! `.lockstats/events/events.ndjson`: a timestamp, the action, the acting
//! `user@HOST`, an optional resource key and a freeform details object.
//!
//! Appending is best-effort: callers warn on stderr when an append fails and
//! carry on, so a broken audit log never blocks an operator action.

use crate::context::TelemetryContext;
use crate::error::{LockstatsError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;

/// Actions that can be logged as events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// State directory initialization
    Init,
    /// Single lock force-released
    Release,
    /// All open locks force-released
    ReleaseAll,
    /// Both telemetry stores cleared
    Reset,
    /// History retention cleanup
    Clean,
    /// Current table purged by the environment guard
    EnvironmentPurge,
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventAction::Init => write!(f, "init"),
            EventAction::Release => write!(f, "release"),
            EventAction::ReleaseAll => write!(f, "release_all"),
            EventAction::Reset => write!(f, "reset"),
            EventAction::Clean => write!(f, "clean"),
            EventAction::EnvironmentPurge => write!(f, "environment_purge"),
        }
    }
}

/// An event record for the audit log.
///
/// Events are serialized as single-line JSON objects and appended to
/// the events.ndjson file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// RFC3339 timestamp when the event occurred.
    pub ts: DateTime<Utc>,

    /// The action that was performed.
    pub action: EventAction,

    /// The actor who performed the action (e.g., `user@HOST`).
    pub actor: String,

    /// Optional resource key for key-specific events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resourcekey: Option<String>,

    /// Freeform details object with action-specific information.
    pub details: Value,
}

impl Event {
    /// Create a new event with the given action.
    ///
    /// The timestamp is set to the current time, and the actor is
    /// determined from the environment (USER@HOSTNAME).
    pub fn new(action: EventAction) -> Self {
        Self {
            ts: Utc::now(),
            action,
            actor: get_actor_string(),
            resourcekey: None,
            details: Value::Object(serde_json::Map::new()),
        }
    }

    /// Set the resource key for this event.
    pub fn with_resourcekey(mut self, resourcekey: impl Into<String>) -> Self {
        self.resourcekey = Some(resourcekey.into());
        self
    }

    /// Set the details object for this event.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Serialize the event to a single-line JSON string.
    ///
    /// This is used for NDJSON format where each line is a complete JSON object.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            LockstatsError::StorageError(format!("failed to serialize event to JSON: {}", e))
        })
    }
}

/// Get the actor string for event metadata.
fn get_actor_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}

/// Append an event as one NDJSON line, synced to disk.
///
/// Creates the events directory and log file on first use.
pub fn append_event(ctx: &TelemetryContext, event: &Event) -> Result<()> {
    let json_line = event.to_ndjson_line()?;

    let events_dir = ctx.events_dir();
    fs::create_dir_all(&events_dir).map_err(|e| {
        LockstatsError::StorageError(format!(
            "failed to create events directory '{}': {}",
            events_dir.display(),
            e
        ))
    })?;

    let events_file = ctx.events_file();
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&events_file)
        .map_err(|e| {
            LockstatsError::StorageError(format!(
                "failed to open events file '{}': {}",
                events_file.display(),
                e
            ))
        })?;

    writeln!(file, "{}", json_line)
        .and_then(|()| file.sync_all())
        .map_err(|e| {
            LockstatsError::StorageError(format!(
                "failed to append event to '{}': {}",
                events_file.display(),
                e
            ))
        })
}
