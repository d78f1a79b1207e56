//! Implementation of the `lockstats list` command.
//!
//! Prints every open lock, oldest grant first, with holder, humanized age
//! and resolved task identity. Rows held beyond the stale window carry a
//! `[STALE]` marker.

use crate::check;
use crate::commands::warn_if_disabled;
use crate::config::Config;
use crate::context::require_initialized;
use crate::error::Result;
use crate::store::CurrentTable;
use chrono::Utc;

/// Execute the `lockstats list` command.
pub fn cmd_list() -> Result<()> {
    let ctx = require_initialized()?;
    let config = Config::load(ctx.config_path()).unwrap_or_default();
    warn_if_disabled(&config);

    let current = CurrentTable::new(&ctx);
    let rows = current.list_open()?;

    if rows.is_empty() {
        println!("No open locks.");
        return Ok(());
    }

    let now = Utc::now();
    println!(
        "{:<8} {:<14} {:<10} {:<13} {:<30} NAME",
        "PID", "HOST", "TYPE", "HELD", "KEY"
    );
    for row in &rows {
        let kind = row.kind.to_string();
        let name = row.classname.as_deref().unwrap_or("-");
        let marker = if check::is_stale(row, now) {
            "  [STALE]"
        } else {
            ""
        };
        println!(
            "{:<8} {:<14} {:<10} {:<13} {:<30} {}{}",
            row.pid,
            row.host,
            kind,
            row.age_string(now),
            row.resourcekey,
            name,
            marker
        );
    }
    println!();
    println!("Found {} open lock(s).", rows.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TelemetryContext;
    use crate::exit_codes;
    use crate::registry::TaskIdentity;
    use crate::test_support::{DirGuard, create_initialized_state};
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn list_fails_without_initialized_state() {
        let temp_dir = TempDir::new().unwrap();
        let _guard = DirGuard::new(temp_dir.path());

        let result = cmd_list();
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().exit_code(), exit_codes::USER_ERROR);
    }

    #[test]
    #[serial]
    fn list_succeeds_with_empty_state() {
        let temp_dir = create_initialized_state();
        let _guard = DirGuard::new(temp_dir.path());

        cmd_list().unwrap();
    }

    #[test]
    #[serial]
    fn list_succeeds_with_open_rows() {
        let temp_dir = create_initialized_state();
        let _guard = DirGuard::new(temp_dir.path());

        let ctx = TelemetryContext::resolve_from(temp_dir.path());
        let current = CurrentTable::new(&ctx);
        current
            .upsert_gain("adhoc_1", &TaskIdentity::unknown(), Utc::now())
            .unwrap();

        cmd_list().unwrap();
    }
}
