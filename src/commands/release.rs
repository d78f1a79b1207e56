//! Implementation of the `lockstats release` command.
//!
//! Operator override for stuck locks: evicts the holder at the provider
//! directly, then marks the current-table row released so the telemetry
//! converges. History is never touched; a force-released episode has no
//! meaningful duration.

use crate::cli::ReleaseArgs;
use crate::commands::warn_if_disabled;
use crate::config::Config;
use crate::context::{TelemetryContext, require_initialized};
use crate::error::{LockstatsError, Result};
use crate::events::{Event, EventAction, append_event};
use crate::provider::{FileLockProvider, LockProvider};
use crate::store::CurrentTable;
use chrono::Utc;
use serde_json::json;

struct ReleaseOutcome {
    owner: Option<String>,
    had_open_row: bool,
}

/// Execute the `lockstats release` command.
pub fn cmd_release(args: ReleaseArgs) -> Result<()> {
    // Require --force flag
    if !args.force {
        let target = args.resourcekey.as_deref().unwrap_or("--all");
        return Err(LockstatsError::UserError(format!(
            "refusing to release lock(s) without --force flag.\n\n\
             Force releasing evicts the holder at the provider even if it is\n\
             still running. Only do this when the holder is known to be dead.\n\n\
             To release, run:\n  lockstats release {} --force",
            target
        )));
    }

    if args.resourcekey.is_some() && args.all {
        return Err(LockstatsError::UserError(
            "pass either a resource key or --all, not both".to_string(),
        ));
    }
    if args.resourcekey.is_none() && !args.all {
        return Err(LockstatsError::UserError(
            "pass a resource key to release, or --all for every open lock".to_string(),
        ));
    }

    let ctx = require_initialized()?;
    let config = Config::load(ctx.config_path()).unwrap_or_default();
    warn_if_disabled(&config);

    let provider = FileLockProvider::new(&ctx);
    let current = CurrentTable::new(&ctx);

    if let Some(key) = args.resourcekey.as_deref() {
        let outcome = release_one(&ctx, &provider, &current, key)?;
        if outcome.owner.is_none() && !outcome.had_open_row {
            return Err(LockstatsError::UserError(format!(
                "no lock file or open telemetry row found for '{}'",
                key
            )));
        }

        println!("Released lock: {}", key);
        if let Some(owner) = &outcome.owner {
            println!("  Evicted holder: {}", owner);
        }
        if outcome.had_open_row {
            println!("  Telemetry row marked released.");
        }
        return Ok(());
    }

    let rows = current.list_open()?;
    if rows.is_empty() {
        println!("No open locks to release.");
        return Ok(());
    }

    for row in &rows {
        release_one(&ctx, &provider, &current, &row.resourcekey)?;
        println!("Released lock: {}", row.resourcekey);
    }

    let event = Event::new(EventAction::ReleaseAll).with_details(json!({
        "released": rows.len(),
    }));
    if let Err(e) = append_event(&ctx, &event) {
        eprintln!("Warning: failed to log release_all event: {}", e);
    }

    println!();
    println!("Released {} lock(s).", rows.len());

    Ok(())
}

/// Evict the holder at the provider and close the telemetry row.
///
/// Appends one audit event when either side had something to release.
fn release_one(
    ctx: &TelemetryContext,
    provider: &FileLockProvider,
    current: &CurrentTable,
    resourcekey: &str,
) -> Result<ReleaseOutcome> {
    let owner = provider.force_release(resourcekey)?;
    let episode = current.mark_released(resourcekey, Utc::now())?;

    let outcome = ReleaseOutcome {
        owner,
        had_open_row: episode.is_some(),
    };

    if outcome.owner.is_some() || outcome.had_open_row {
        let event = Event::new(EventAction::Release)
            .with_resourcekey(resourcekey)
            .with_details(json!({
                "owner": outcome.owner,
                "had_open_row": outcome.had_open_row,
            }));
        if let Err(e) = append_event(ctx, &event) {
            eprintln!("Warning: failed to log release event: {}", e);
        }
    }

    Ok(outcome)
}
