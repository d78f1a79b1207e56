//! Implementation of the `lockstats reset` command.
//!
//! Clears both telemetry tables. The row-id counters survive so history
//! back-references are never reused.

use crate::cli::ResetArgs;
use crate::commands::warn_if_disabled;
use crate::config::Config;
use crate::context::require_initialized;
use crate::error::{LockstatsError, Result};
use crate::events::{Event, EventAction, append_event};
use crate::store::{CurrentTable, HistoryTable};
use serde_json::json;

/// Execute the `lockstats reset` command.
pub fn cmd_reset(args: ResetArgs) -> Result<()> {
    // Require --force flag
    if !args.force {
        return Err(LockstatsError::UserError(
            "refusing to reset telemetry without --force flag.\n\n\
             This permanently clears the current-lock table and all duration\n\
             history for this state directory.\n\n\
             To reset, run:\n  lockstats reset --force"
                .to_string(),
        ));
    }

    let ctx = require_initialized()?;
    let config = Config::load(ctx.config_path()).unwrap_or_default();
    warn_if_disabled(&config);

    let current = CurrentTable::new(&ctx);
    let history = HistoryTable::new(&ctx);

    let cleared_current = current.clear_all()?;
    let cleared_history = history.clear_all()?;

    let event = Event::new(EventAction::Reset).with_details(json!({
        "cleared_current": cleared_current,
        "cleared_history": cleared_history,
    }));
    if let Err(e) = append_event(&ctx, &event) {
        eprintln!("Warning: failed to log reset event: {}", e);
    }

    println!(
        "Cleared {} current row(s) and {} history row(s).",
        cleared_current, cleared_history
    );

    Ok(())
}
