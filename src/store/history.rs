//! The history table: completed lock episodes aggregated by task.
//!
//! Aggregation is a write-amplification control, not sampling. Short episodes
//! fold into a shared row with a count; any episode that alone exceeds the
//! threshold, or arrives after a row has filled up, gets its own row. No data
//! is discarded, only folded.

use crate::context::TelemetryContext;
use crate::error::{LockstatsError, Result};
use crate::fs::atomic_write_file;
use crate::registry::TaskKind;
use crate::store::types::{HistoryEntry, LockEpisode};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

fn default_next_id() -> u64 {
    1
}

/// Persisted document backing the history table.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct HistoryDoc {
    /// Auto-increment entry-id counter; survives resets.
    #[serde(default = "default_next_id")]
    next_id: u64,

    #[serde(default)]
    entries: Vec<HistoryEntry>,
}

impl Default for HistoryDoc {
    fn default() -> Self {
        Self {
            next_id: 1,
            entries: Vec::new(),
        }
    }
}

/// How a completed episode was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOutcome {
    /// A new history row was created with this id.
    New(u64),
    /// The episode was folded into the existing row with this id.
    Folded(u64),
}

/// Handle on the persisted history table.
#[derive(Debug, Clone)]
pub struct HistoryTable {
    path: PathBuf,
}

impl HistoryTable {
    /// Create a table handle for the context's history-table path.
    pub fn new(ctx: &TelemetryContext) -> Self {
        Self {
            path: ctx.history_table_path(),
        }
    }

    fn load(&self) -> Result<HistoryDoc> {
        if !self.path.exists() {
            return Ok(HistoryDoc::default());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            LockstatsError::StorageError(format!(
                "failed to read history table '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            LockstatsError::StorageError(format!(
                "failed to parse history table '{}': {}",
                self.path.display(),
                e
            ))
        })
    }

    fn save(&self, doc: &HistoryDoc) -> Result<()> {
        let json = serde_json::to_string_pretty(doc).map_err(|e| {
            LockstatsError::StorageError(format!("failed to serialize history table: {}", e))
        })?;

        atomic_write_file(&self.path, &json)
    }

    /// Record a completed episode, folding it into the task's most recent
    /// row while that row's cumulative duration is still under the
    /// threshold.
    ///
    /// A new row is started when the task has no row yet, when the most
    /// recent row has already accumulated `threshold_secs`, or when the
    /// episode's own duration exceeds the threshold by itself. "Most recent"
    /// is the row with the greatest id for the task, so ties on timestamps
    /// break deterministically.
    pub fn record(
        &self,
        episode: &LockEpisode,
        threshold_secs: i64,
        now: DateTime<Utc>,
    ) -> Result<HistoryOutcome> {
        let mut doc = self.load()?;
        let duration = episode.duration.unwrap_or(0);

        // Latency aggregation is adhoc-specific
        let latency = if episode.kind == TaskKind::Adhoc {
            episode.latency
        } else {
            None
        };

        let recent_idx = doc
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.taskid == episode.id)
            .max_by_key(|(_, e)| e.id)
            .map(|(i, _)| i);

        if let Some(i) = recent_idx
            && doc.entries[i].duration < threshold_secs
            && duration <= threshold_secs
        {
            let entry = &mut doc.entries[i];
            entry.lockcount += 1;
            entry.duration += duration;
            entry.gained = episode.gained;
            entry.released = now;
            if let Some(lat) = latency {
                entry.latency = Some(entry.latency.unwrap_or(0) + lat);
            }
            let id = entry.id;

            self.save(&doc)?;
            return Ok(HistoryOutcome::Folded(id));
        }

        let id = doc.next_id;
        doc.next_id += 1;
        doc.entries.push(HistoryEntry {
            id,
            taskid: episode.id,
            kind: episode.kind,
            classname: episode.classname.clone(),
            component: episode.component.clone(),
            gained: episode.gained,
            released: episode.released.unwrap_or(now),
            duration,
            lockcount: 1,
            latency,
        });

        self.save(&doc)?;
        Ok(HistoryOutcome::New(id))
    }

    /// Rows released within the last `days`, slowest first, capped at
    /// `limit`.
    pub fn slowest(&self, days: i64, limit: usize, now: DateTime<Utc>) -> Result<Vec<HistoryEntry>> {
        let doc = self.load()?;
        let cutoff = now - Duration::days(days);

        let mut entries: Vec<HistoryEntry> = doc
            .entries
            .into_iter()
            .filter(|e| e.released >= cutoff)
            .collect();
        entries.sort_by(|a, b| b.duration.cmp(&a.duration));
        entries.truncate(limit);
        Ok(entries)
    }

    /// Delete rows released before `cutoff`. Returns the pruned count.
    pub fn prune_released_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut doc = self.load()?;

        let before = doc.entries.len();
        doc.entries.retain(|e| e.released >= cutoff);
        let pruned = before - doc.entries.len();

        if pruned > 0 {
            self.save(&doc)?;
        }
        Ok(pruned)
    }

    /// All rows in insertion order.
    pub fn all(&self) -> Result<Vec<HistoryEntry>> {
        Ok(self.load()?.entries)
    }

    /// Delete every row, preserving the id counter.
    ///
    /// Returns the number of rows removed.
    pub fn clear_all(&self) -> Result<usize> {
        let mut doc = self.load()?;

        let removed = doc.entries.len();
        doc.entries.clear();
        self.save(&doc)?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn test_table() -> (TempDir, HistoryTable) {
        let temp_dir = TempDir::new().unwrap();
        let ctx = crate::context::TelemetryContext::resolve_from(temp_dir.path());
        let table = HistoryTable::new(&ctx);
        (temp_dir, table)
    }

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn episode(taskid: u64, gained: DateTime<Utc>, duration: i64) -> LockEpisode {
        LockEpisode {
            id: taskid,
            resourcekey: format!("adhoc_{}", taskid),
            host: "worker01".to_string(),
            pid: 100,
            gained,
            released: Some(gained + Duration::seconds(duration)),
            duration: Some(duration),
            kind: TaskKind::Adhoc,
            classname: Some("reindex".to_string()),
            component: None,
            customdata: None,
            latency: None,
        }
    }

    #[test]
    fn test_first_episode_creates_row() {
        let (_dir, table) = test_table();

        let outcome = table.record(&episode(1, t(0), 2), 5, t(2)).unwrap();
        assert_eq!(outcome, HistoryOutcome::New(1));

        let entries = table.all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].taskid, 1);
        assert_eq!(entries[0].duration, 2);
        assert_eq!(entries[0].lockcount, 1);
    }

    #[test]
    fn test_short_episodes_fold_until_threshold() {
        let (_dir, table) = test_table();
        let threshold = 5;

        // Three one-second episodes collapse into a single row
        table.record(&episode(1, t(0), 1), threshold, t(1)).unwrap();
        table.record(&episode(1, t(10), 1), threshold, t(11)).unwrap();
        table.record(&episode(1, t(20), 1), threshold, t(21)).unwrap();

        let entries = table.all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].lockcount, 3);
        assert_eq!(entries[0].duration, 3);

        // A fourth short episode still folds (3 + 1 < 5)
        let outcome = table.record(&episode(1, t(30), 1), threshold, t(31)).unwrap();
        assert_eq!(outcome, HistoryOutcome::Folded(1));

        let entries = table.all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].lockcount, 4);
        assert_eq!(entries[0].duration, 4);

        // A long episode starts its own row; the old one stays frozen
        let outcome = table.record(&episode(1, t(40), 10), threshold, t(50)).unwrap();
        assert_eq!(outcome, HistoryOutcome::New(2));

        let entries = table.all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].lockcount, 4);
        assert_eq!(entries[0].duration, 4);
        assert_eq!(entries[1].lockcount, 1);
        assert_eq!(entries[1].duration, 10);
    }

    #[test]
    fn test_full_row_stops_accepting_folds() {
        let (_dir, table) = test_table();

        // A single over-threshold episode is its own row
        table.record(&episode(1, t(0), 10), 5, t(10)).unwrap();

        // The next episode must not fold into it, however short
        let outcome = table.record(&episode(1, t(20), 1), 5, t(21)).unwrap();
        assert_eq!(outcome, HistoryOutcome::New(2));

        let entries = table.all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].duration, 10);
        assert_eq!(entries[1].duration, 1);
    }

    #[test]
    fn test_episode_at_exact_threshold_still_folds() {
        let (_dir, table) = test_table();
        let threshold = 5;

        table.record(&episode(1, t(0), 1), threshold, t(1)).unwrap();

        // Exactly threshold seconds folds; only strictly longer episodes
        // open their own row
        let outcome = table.record(&episode(1, t(10), 5), threshold, t(15)).unwrap();
        assert_eq!(outcome, HistoryOutcome::Folded(1));

        let entries = table.all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].lockcount, 2);
        assert_eq!(entries[0].duration, 6);

        // The folded row is past the threshold now and stops accepting
        let outcome = table.record(&episode(1, t(20), 1), threshold, t(21)).unwrap();
        assert_eq!(outcome, HistoryOutcome::New(2));
    }

    #[test]
    fn test_fold_advances_rolling_window() {
        let (_dir, table) = test_table();

        table.record(&episode(1, t(0), 1), 60, t(1)).unwrap();
        table.record(&episode(1, t(100), 2), 60, t(102)).unwrap();

        let entries = table.all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].gained, t(100));
        assert_eq!(entries[0].released, t(102));
        assert_eq!(entries[0].duration, 3);
    }

    #[test]
    fn test_fold_targets_most_recent_row_for_task() {
        let (_dir, table) = test_table();

        // Row 1 fills up, row 2 starts fresh
        table.record(&episode(1, t(0), 10), 5, t(10)).unwrap();
        table.record(&episode(1, t(20), 1), 5, t(21)).unwrap();

        // Short episode folds into row 2, not row 1
        let outcome = table.record(&episode(1, t(30), 1), 5, t(31)).unwrap();
        assert_eq!(outcome, HistoryOutcome::Folded(2));

        let entries = table.all().unwrap();
        assert_eq!(entries[0].duration, 10);
        assert_eq!(entries[0].lockcount, 1);
        assert_eq!(entries[1].duration, 2);
        assert_eq!(entries[1].lockcount, 2);
    }

    #[test]
    fn test_tasks_do_not_share_rows() {
        let (_dir, table) = test_table();

        table.record(&episode(1, t(0), 1), 60, t(1)).unwrap();
        table.record(&episode(2, t(0), 1), 60, t(1)).unwrap();

        let entries = table.all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].taskid, 1);
        assert_eq!(entries[1].taskid, 2);
    }

    #[test]
    fn test_latency_accumulates_for_adhoc() {
        let (_dir, table) = test_table();

        let mut first = episode(1, t(0), 1);
        first.latency = Some(3);
        let mut second = episode(1, t(10), 1);
        second.latency = Some(4);

        table.record(&first, 60, t(1)).unwrap();
        table.record(&second, 60, t(11)).unwrap();

        let entries = table.all().unwrap();
        assert_eq!(entries[0].latency, Some(7));
    }

    #[test]
    fn test_latency_ignored_for_scheduled() {
        let (_dir, table) = test_table();

        let mut ep = episode(1, t(0), 1);
        ep.kind = TaskKind::Scheduled;
        ep.latency = Some(9);

        table.record(&ep, 60, t(1)).unwrap();

        let entries = table.all().unwrap();
        assert_eq!(entries[0].latency, None);
    }

    #[test]
    fn test_slowest_orders_by_duration_within_window() {
        let (_dir, table) = test_table();

        table.record(&episode(1, t(0), 30), 5, t(30)).unwrap();
        table.record(&episode(2, t(0), 90), 5, t(90)).unwrap();
        table.record(&episode(3, t(0), 60), 5, t(60)).unwrap();

        let slowest = table.slowest(7, 10, t(100)).unwrap();
        let durations: Vec<i64> = slowest.iter().map(|e| e.duration).collect();
        assert_eq!(durations, vec![90, 60, 30]);

        let top_two = table.slowest(7, 2, t(100)).unwrap();
        assert_eq!(top_two.len(), 2);
        assert_eq!(top_two[0].duration, 90);
    }

    #[test]
    fn test_slowest_excludes_rows_outside_window() {
        let (_dir, table) = test_table();

        table.record(&episode(1, t(0), 30), 5, t(30)).unwrap();

        let now = t(0) + Duration::days(10);
        assert!(table.slowest(7, 10, now).unwrap().is_empty());
        assert_eq!(table.slowest(11, 10, now).unwrap().len(), 1);
    }

    #[test]
    fn test_prune_released_before() {
        let (_dir, table) = test_table();

        table.record(&episode(1, t(0), 7), 5, t(7)).unwrap();
        table.record(&episode(2, t(1000), 7), 5, t(1007)).unwrap();

        let pruned = table.prune_released_before(t(500)).unwrap();
        assert_eq!(pruned, 1);

        let entries = table.all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].taskid, 2);

        // Nothing left to prune
        assert_eq!(table.prune_released_before(t(500)).unwrap(), 0);
    }

    #[test]
    fn test_clear_all_preserves_id_counter() {
        let (_dir, table) = test_table();

        table.record(&episode(1, t(0), 10), 5, t(10)).unwrap();
        table.record(&episode(2, t(0), 10), 5, t(10)).unwrap();

        assert_eq!(table.clear_all().unwrap(), 2);
        assert!(table.all().unwrap().is_empty());

        let outcome = table.record(&episode(3, t(100), 10), 5, t(110)).unwrap();
        assert_eq!(outcome, HistoryOutcome::New(3));
    }
}
