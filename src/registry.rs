//! Task identity resolution for lockstats.
//!
//! Lock resource keys follow the task runner's conventions: ad hoc task
//! instances lock `adhoc_<id>` while scheduled tasks lock their classname
//! directly. This module classifies a resource key once, at the point of
//! telemetry capture, and enriches it with metadata from the task definition
//! files when they have a matching entry.

use crate::context::TelemetryContext;
use crate::error::{LockstatsError, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Regex pattern for ad hoc task resource keys.
static ADHOC_KEY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^adhoc_(\d+)$").expect("Invalid adhoc key regex"));

/// The kind of task a resource key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// The key matches no known task shape.
    Unknown,
    /// A queued, one-off ad hoc task instance.
    Adhoc,
    /// A recurring scheduled task.
    Scheduled,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Unknown => write!(f, "unknown"),
            TaskKind::Adhoc => write!(f, "adhoc"),
            TaskKind::Scheduled => write!(f, "scheduled"),
        }
    }
}

/// One entry in the ad hoc task backlog (`tasks/adhoc.json`).
///
/// The backlog is maintained by the surrounding task runner and read-only
/// from this crate's point of view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdhocTask {
    /// Instance id, matching the `adhoc_<id>` resource key.
    pub id: u64,

    /// Task classname.
    pub classname: String,

    /// Opaque payload attached when the task was queued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customdata: Option<String>,

    /// When the task was queued.
    pub enqueued_at: DateTime<Utc>,

    /// Current retry backoff in seconds; nonzero means the task has failed.
    #[serde(default)]
    pub fail_delay: u32,
}

/// One entry in the scheduled task registry (`tasks/scheduled.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTask {
    /// Task classname, which doubles as its lock resource key.
    pub classname: String,

    /// Owning component/module.
    pub component: String,
}

/// Resolved identity for a resource key.
///
/// Enrichment fields stay `None` when the definition files have no matching
/// entry; classification never fails just because a task is unresolvable.
#[derive(Debug, Clone)]
pub struct TaskIdentity {
    /// Classified task kind, derived from the key's shape and the registry.
    pub kind: TaskKind,

    /// Task classname, when resolved.
    pub classname: Option<String>,

    /// Owning component, when resolved (scheduled tasks only).
    pub component: Option<String>,

    /// Opaque payload from the backlog (ad hoc tasks only).
    pub customdata: Option<String>,

    /// Queue time from the backlog (ad hoc tasks only).
    pub enqueued_at: Option<DateTime<Utc>>,
}

impl TaskIdentity {
    /// An identity with no resolved metadata.
    pub fn unknown() -> Self {
        Self {
            kind: TaskKind::Unknown,
            classname: None,
            component: None,
            customdata: None,
            enqueued_at: None,
        }
    }
}

/// Reader over the task definition files.
#[derive(Debug, Clone)]
pub struct TaskRegistry {
    adhoc_path: PathBuf,
    scheduled_path: PathBuf,
}

impl TaskRegistry {
    /// Create a registry reading from the context's task definition paths.
    pub fn new(ctx: &TelemetryContext) -> Self {
        Self {
            adhoc_path: ctx.adhoc_backlog_path(),
            scheduled_path: ctx.scheduled_registry_path(),
        }
    }

    /// Extract the ad hoc instance id from a resource key, if it has one.
    pub fn adhoc_id(resourcekey: &str) -> Option<u64> {
        ADHOC_KEY_REGEX
            .captures(resourcekey)
            .and_then(|caps| caps[1].parse().ok())
    }

    /// Load the ad hoc task backlog. A missing file is an empty backlog.
    pub fn load_adhoc(&self) -> Result<Vec<AdhocTask>> {
        load_task_file(&self.adhoc_path)
    }

    /// Load the scheduled task registry. A missing file is an empty registry.
    pub fn load_scheduled(&self) -> Result<Vec<ScheduledTask>> {
        load_task_file(&self.scheduled_path)
    }

    /// Classify a resource key and resolve its task metadata.
    ///
    /// Keys shaped `adhoc_<digits>` are ad hoc regardless of whether the
    /// backlog still holds the instance; other keys are scheduled only on an
    /// exact classname match in the registry, and unknown otherwise.
    pub fn classify(&self, resourcekey: &str) -> Result<TaskIdentity> {
        if let Some(id) = Self::adhoc_id(resourcekey) {
            let backlog = self.load_adhoc()?;
            let entry = backlog.into_iter().find(|task| task.id == id);

            return Ok(match entry {
                Some(task) => TaskIdentity {
                    kind: TaskKind::Adhoc,
                    classname: Some(task.classname),
                    component: None,
                    customdata: task.customdata,
                    enqueued_at: Some(task.enqueued_at),
                },
                None => TaskIdentity {
                    kind: TaskKind::Adhoc,
                    ..TaskIdentity::unknown()
                },
            });
        }

        let registry = self.load_scheduled()?;
        if let Some(task) = registry
            .into_iter()
            .find(|task| task.classname == resourcekey)
        {
            return Ok(TaskIdentity {
                kind: TaskKind::Scheduled,
                classname: Some(task.classname),
                component: Some(task.component),
                customdata: None,
                enqueued_at: None,
            });
        }

        Ok(TaskIdentity::unknown())
    }
}

/// Parse a JSON array of task entries, treating a missing file as empty.
fn load_task_file<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path).map_err(|e| {
        LockstatsError::StorageError(format!(
            "failed to read task file '{}': {}",
            path.display(),
            e
        ))
    })?;

    serde_json::from_str(&content).map_err(|e| {
        LockstatsError::StorageError(format!(
            "failed to parse task file '{}': {}",
            path.display(),
            e
        ))
    })
}
