//! Aggregated per-task reporting for lockstats.
//!
//! Joins the ad hoc backlog, the current table and the history table into
//! one counter row per ad hoc classname.

use crate::error::Result;
use crate::registry::{TaskKind, TaskRegistry};
use crate::store::{CurrentTable, HistoryTable};
use std::collections::BTreeSet;

/// Counter row for one ad hoc task classname.
#[derive(Debug, Clone)]
pub struct TaskCounters {
    /// The task classname.
    pub classname: String,

    /// Backlog entries waiting to run.
    pub queued: usize,

    /// Open current-table rows (locks held right now).
    pub running: usize,

    /// Episodes recorded in history (sum of lockcounts).
    pub processed: u64,

    /// Backlog entries with a nonzero fail delay.
    pub failed: usize,

    /// Mean of per-history-row average latency, in seconds.
    pub latency_avg: Option<f64>,

    /// Largest per-history-row average latency, in seconds.
    pub latency_max: Option<f64>,
}

/// Build counters for every ad hoc classname seen in the backlog, the
/// current table or the history table. Rows come back sorted by classname.
pub fn task_counters(
    registry: &TaskRegistry,
    current: &CurrentTable,
    history: &HistoryTable,
) -> Result<Vec<TaskCounters>> {
    let backlog = registry.load_adhoc()?;
    let current_rows = current.all()?;
    let history_rows = history.all()?;

    let mut classnames: BTreeSet<String> = BTreeSet::new();
    for task in &backlog {
        classnames.insert(task.classname.clone());
    }
    for row in current_rows.iter().filter(|r| r.kind == TaskKind::Adhoc) {
        if let Some(name) = &row.classname {
            classnames.insert(name.clone());
        }
    }
    for entry in history_rows.iter().filter(|e| e.kind == TaskKind::Adhoc) {
        if let Some(name) = &entry.classname {
            classnames.insert(name.clone());
        }
    }

    let mut counters = Vec::with_capacity(classnames.len());
    for classname in classnames {
        let queued = backlog.iter().filter(|t| t.classname == classname).count();
        let failed = backlog
            .iter()
            .filter(|t| t.classname == classname && t.fail_delay > 0)
            .count();
        let running = current_rows
            .iter()
            .filter(|r| {
                r.kind == TaskKind::Adhoc
                    && r.is_open()
                    && r.classname.as_deref() == Some(classname.as_str())
            })
            .count();

        let mut processed: u64 = 0;
        // Each history row's latency is cumulative over its lockcount, so
        // the per-row average is the comparable quantity
        let mut row_avgs: Vec<f64> = Vec::new();
        for entry in history_rows.iter().filter(|e| {
            e.kind == TaskKind::Adhoc && e.classname.as_deref() == Some(classname.as_str())
        }) {
            processed += u64::from(entry.lockcount);
            if let Some(latency) = entry.latency
                && entry.lockcount > 0
            {
                row_avgs.push(latency as f64 / f64::from(entry.lockcount));
            }
        }

        let latency_avg = if row_avgs.is_empty() {
            None
        } else {
            Some(row_avgs.iter().sum::<f64>() / row_avgs.len() as f64)
        };
        let latency_max = row_avgs
            .iter()
            .copied()
            .fold(None, |max: Option<f64>, v| Some(max.map_or(v, |m| m.max(v))));

        counters.push(TaskCounters {
            classname,
            queued,
            running,
            processed,
            failed,
            latency_avg,
            latency_max,
        });
    }

    Ok(counters)
}
