//! Implementation of the `lockstats clean` command.
//!
//! Prunes history rows released before the retention window. The window
//! comes from `history_retention_days` in config; `--days` overrides it
//! for one run.

use crate::cli::CleanArgs;
use crate::commands::warn_if_disabled;
use crate::config::Config;
use crate::context::require_initialized;
use crate::error::{LockstatsError, Result};
use crate::events::{Event, EventAction, append_event};
use crate::store::HistoryTable;
use chrono::{Duration, Utc};
use serde_json::json;

/// Execute the `lockstats clean` command.
pub fn cmd_clean(args: CleanArgs) -> Result<()> {
    let ctx = require_initialized()?;
    let config = Config::load(ctx.config_path()).unwrap_or_default();
    warn_if_disabled(&config);

    let days = args.days.unwrap_or(config.history_retention_days);
    if days == 0 {
        return Err(LockstatsError::UserError(
            "retention window must be greater than 0 days".to_string(),
        ));
    }

    let cutoff = Utc::now() - Duration::days(i64::from(days));
    let history = HistoryTable::new(&ctx);
    let pruned = history.prune_released_before(cutoff)?;

    let event = Event::new(EventAction::Clean).with_details(json!({
        "days": days,
        "pruned": pruned,
    }));
    if let Err(e) = append_event(&ctx, &event) {
        eprintln!("Warning: failed to log clean event: {}", e);
    }

    println!(
        "Pruned {} history row(s) released more than {} day(s) ago.",
        pruned, days
    );

    Ok(())
}
