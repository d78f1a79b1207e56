//! Implementation of the `lockstats history` command.
//!
//! Lists the slowest completed lock episodes: aggregated history rows
//! released within the window, duration descending.

use crate::cli::HistoryArgs;
use crate::commands::warn_if_disabled;
use crate::config::Config;
use crate::context::require_initialized;
use crate::error::Result;
use crate::store::{HistoryTable, format_age};
use chrono::{Duration, Utc};

/// Execute the `lockstats history` command.
pub fn cmd_history(args: HistoryArgs) -> Result<()> {
    let ctx = require_initialized()?;
    let config = Config::load(ctx.config_path()).unwrap_or_default();
    warn_if_disabled(&config);

    let history = HistoryTable::new(&ctx);
    let entries = history.slowest(i64::from(args.days), args.limit, Utc::now())?;

    if entries.is_empty() {
        println!(
            "No completed lock episodes in the last {} day(s).",
            args.days
        );
        return Ok(());
    }

    println!(
        "{:<12} {:<7} {:<10} {:<24} NAME",
        "DURATION", "LOCKS", "TYPE", "RELEASED"
    );
    for entry in &entries {
        let duration = format_age(Duration::seconds(entry.duration));
        let kind = entry.kind.to_string();
        let released = entry
            .released
            .format("%Y-%m-%d %H:%M:%S UTC")
            .to_string();
        let name = entry.classname.as_deref().unwrap_or("-");
        println!(
            "{:<12} {:<7} {:<10} {:<24} {}",
            duration, entry.lockcount, kind, released, name
        );
    }
    println!();
    println!(
        "Showing {} of the slowest episodes from the last {} day(s).",
        entries.len(),
        args.days
    );

    Ok(())
}
