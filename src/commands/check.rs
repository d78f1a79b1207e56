//! Implementation of the `lockstats check` command.
//!
//! A monitoring probe over the current-state table. Exits 0 when no lock
//! has been held beyond the stale window and 2 otherwise, so it can sit
//! directly behind a health-check script.

use crate::check::stale_lock_check;
use crate::commands::warn_if_disabled;
use crate::config::Config;
use crate::context::require_initialized;
use crate::error::{LockstatsError, Result};
use crate::store::CurrentTable;
use chrono::Utc;

/// Execute the `lockstats check` command.
pub fn cmd_check() -> Result<()> {
    let ctx = require_initialized()?;
    let config = Config::load(ctx.config_path()).unwrap_or_default();
    warn_if_disabled(&config);

    let now = Utc::now();
    let current = CurrentTable::new(&ctx);
    let result = stale_lock_check(&current, now)?;

    println!("{}: {}", result.status, result.summary);
    for episode in &result.stale {
        println!(
            "  {} held {} by {} (pid {})",
            episode.resourcekey,
            episode.age_string(now),
            episode.host,
            episode.pid
        );
    }

    if !result.stale.is_empty() {
        return Err(LockstatsError::ValidationError(format!(
            "{} stale lock(s) detected",
            result.stale.len()
        )));
    }

    Ok(())
}
