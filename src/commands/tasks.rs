//! Implementation of the `lockstats tasks` command.
//!
//! Per-task counter table for ad hoc tasks: backlog, open locks and history
//! joined into one row per classname.

use crate::commands::warn_if_disabled;
use crate::config::Config;
use crate::context::require_initialized;
use crate::error::Result;
use crate::registry::TaskRegistry;
use crate::report;
use crate::store::{CurrentTable, HistoryTable};

/// Execute the `lockstats tasks` command.
pub fn cmd_tasks() -> Result<()> {
    let ctx = require_initialized()?;
    let config = Config::load(ctx.config_path()).unwrap_or_default();
    warn_if_disabled(&config);

    let registry = TaskRegistry::new(&ctx);
    let current = CurrentTable::new(&ctx);
    let history = HistoryTable::new(&ctx);

    let counters = report::task_counters(&registry, &current, &history)?;

    if counters.is_empty() {
        println!("No ad hoc task activity.");
        return Ok(());
    }

    println!(
        "{:<8} {:<8} {:<10} {:<8} {:<10} {:<10} CLASSNAME",
        "QUEUED", "RUNNING", "PROCESSED", "FAILED", "AVG LAT", "MAX LAT"
    );
    for row in &counters {
        println!(
            "{:<8} {:<8} {:<10} {:<8} {:<10} {:<10} {}",
            row.queued,
            row.running,
            row.processed,
            row.failed,
            latency_cell(row.latency_avg),
            latency_cell(row.latency_max),
            row.classname
        );
    }
    println!();
    println!("Found {} ad hoc task class(es).", counters.len());

    Ok(())
}

fn latency_cell(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}s", v),
        None => "-".to_string(),
    }
}
