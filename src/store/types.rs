//! Row definitions shared by the current-state and history tables.

use crate::registry::TaskKind;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One lock episode in the current-state table.
///
/// At most one row exists per resource key; re-acquiring a key updates its
/// row in place instead of adding a second one. `released == None` means the
/// episode is open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockEpisode {
    /// Monotonic row id, stable across re-acquisitions of the same key.
    pub id: u64,

    /// The resource key the lock was taken on.
    pub resourcekey: String,

    /// Hostname of the most recent holder.
    pub host: String,

    /// Process id of the most recent holder.
    pub pid: u32,

    /// When the most recent grant happened.
    pub gained: DateTime<Utc>,

    /// When the episode was released; `None` while the lock is held.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released: Option<DateTime<Utc>>,

    /// Seconds between `gained` and `released`, set on release.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,

    /// Classified task kind for the key.
    #[serde(rename = "type")]
    pub kind: TaskKind,

    /// Resolved task classname, when the definition files know the key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classname: Option<String>,

    /// Owning component (scheduled tasks only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,

    /// Opaque payload from the ad hoc backlog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customdata: Option<String>,

    /// Seconds between the task being queued and the lock being gained
    /// (ad hoc tasks only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<i64>,
}

impl LockEpisode {
    /// Whether the episode is still open.
    pub fn is_open(&self) -> bool {
        self.released.is_none()
    }

    /// Age of the current grant relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.gained)
    }

    /// Format the grant age as a human-readable string.
    pub fn age_string(&self, now: DateTime<Utc>) -> String {
        format_age(self.age(now))
    }
}

/// One aggregated row in the history table.
///
/// `duration` is the sum over all folded episodes and `lockcount` counts
/// them; a row stops accepting folds once its cumulative duration reaches
/// the configured threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Auto-increment row id; the greatest id for a task is its most
    /// recent row.
    pub id: u64,

    /// Id of the originating current-state row.
    pub taskid: u64,

    /// Task kind copied from the episode.
    #[serde(rename = "type")]
    pub kind: TaskKind,

    /// Task classname copied from the episode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classname: Option<String>,

    /// Owning component copied from the episode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,

    /// Grant time of the newest folded episode (rolling window).
    pub gained: DateTime<Utc>,

    /// Release time of the newest folded episode.
    pub released: DateTime<Utc>,

    /// Cumulative seconds across all folded episodes.
    pub duration: i64,

    /// Number of episodes folded into this row.
    pub lockcount: u32,

    /// Cumulative queue-to-gain latency in seconds (ad hoc tasks only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<i64>,
}

/// Format a duration as a human-readable age string.
pub fn format_age(age: Duration) -> String {
    let minutes = age.num_minutes();
    let hours = age.num_hours();
    let days = age.num_days();

    if days > 0 {
        format!("{}d {}h", days, hours % 24)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes % 60)
    } else {
        format!("{}m", minutes)
    }
}
