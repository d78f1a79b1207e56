//! Stale-lock detection for lockstats.
//!
//! A point-in-time health probe over the current table: any lock still open
//! beyond the stale window flips the status to ERROR. The check never
//! releases or mutates anything; remediation is the explicit `release`
//! command.

use crate::error::Result;
use crate::store::{CurrentTable, LockEpisode};
use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// Age in hours beyond which an open lock counts as stale.
pub const STALE_LOCK_WINDOW_HOURS: i64 = 24;

/// Overall outcome of the stale-lock check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    /// No stale locks present.
    Ok,
    /// At least one lock has been held beyond the stale window.
    Error,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStatus::Ok => write!(f, "OK"),
            CheckStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Result of scanning the current table.
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Overall status.
    pub status: CheckStatus,

    /// Human-readable one-line summary.
    pub summary: String,

    /// The offending rows, oldest grant first.
    pub stale: Vec<LockEpisode>,
}

/// Whether an open episode has crossed the stale window.
///
/// Released episodes are never stale, regardless of how long they ran.
pub fn is_stale(episode: &LockEpisode, now: DateTime<Utc>) -> bool {
    episode.is_open() && episode.age(now) > Duration::hours(STALE_LOCK_WINDOW_HOURS)
}

/// Scan the current table for locks held beyond the stale window.
pub fn stale_lock_check(current: &CurrentTable, now: DateTime<Utc>) -> Result<CheckResult> {
    let stale: Vec<LockEpisode> = current
        .list_open()?
        .into_iter()
        .filter(|episode| is_stale(episode, now))
        .collect();

    let (status, summary) = if stale.is_empty() {
        (CheckStatus::Ok, "No stale locks found.".to_string())
    } else {
        (
            CheckStatus::Error,
            format!(
                "Found {} stale lock(s) held for more than {} hours.",
                stale.len(),
                STALE_LOCK_WINDOW_HOURS
            ),
        )
    };

    Ok(CheckResult {
        status,
        summary,
        stale,
    })
}
