//! Implementation of the `lockstats init` command.
//!
//! Bootstraps the telemetry state directory.
//!
//! # What `lockstats init` does
//!
//! 1. Creates the state directory (default `.lockstats/`, or `LOCKSTATS_DIR`)
//! 2. Creates the `locks/`, `events/` and `tasks/` subdirectories
//! 3. Writes a default `config.yaml`
//! 4. Writes empty task backlog and registry files
//!
//! Errors if the directory is already initialized, so a stray re-run never
//! overwrites a tuned config.

use crate::config::Config;
use crate::context::TelemetryContext;
use crate::error::{LockstatsError, Result};
use crate::events::{Event, EventAction, append_event};
use crate::fs::atomic_write_file;
use serde_json::json;
use std::fs;
use std::path::Path;

/// Execute the `lockstats init` command.
pub fn cmd_init() -> Result<()> {
    let ctx = TelemetryContext::resolve()?;

    if ctx.initialized() {
        return Err(LockstatsError::UserError(format!(
            "lockstats state already initialized at {}.\n\n\
             Edit {} to change settings, or remove the directory\n\
             and run `lockstats init` again to start over.",
            ctx.state_dir.display(),
            ctx.config_path().display()
        )));
    }

    create_dir(&ctx.state_dir)?;
    create_dir(&ctx.locks_dir)?;
    create_dir(&ctx.events_dir())?;
    create_dir(&ctx.tasks_dir())?;

    let config = Config::default();
    atomic_write_file(ctx.config_path(), &config.to_yaml()?)?;
    atomic_write_file(ctx.adhoc_backlog_path(), "[]\n")?;
    atomic_write_file(ctx.scheduled_registry_path(), "[]\n")?;

    let event = Event::new(EventAction::Init).with_details(json!({
        "state_dir": ctx.state_dir.display().to_string(),
    }));
    if let Err(e) = append_event(&ctx, &event) {
        eprintln!("Warning: failed to log init event: {}", e);
    }

    println!("Initialized lockstats telemetry state.");
    println!();
    println!("State directory: {}", ctx.state_dir.display());
    println!();
    println!("Created:");
    println!("  config.yaml");
    println!("  tasks/adhoc.json");
    println!("  tasks/scheduled.json");
    println!("  locks/");
    println!("  events/");
    println!();
    println!("Check lock activity with `lockstats list`.");

    Ok(())
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| {
        LockstatsError::StorageError(format!(
            "failed to create directory {}: {}",
            path.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::DirGuard;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn init_scaffolds_state_directory() {
        let temp_dir = TempDir::new().unwrap();
        let _guard = DirGuard::new(temp_dir.path());

        cmd_init().unwrap();

        let ctx = TelemetryContext::resolve_from(temp_dir.path());
        assert!(ctx.initialized());
        assert!(ctx.locks_dir.is_dir());
        assert!(ctx.events_dir().is_dir());
        assert_eq!(fs::read_to_string(ctx.adhoc_backlog_path()).unwrap(), "[]\n");
        assert_eq!(
            fs::read_to_string(ctx.scheduled_registry_path()).unwrap(),
            "[]\n"
        );

        // The written config parses back to the defaults
        let config = Config::load(ctx.config_path()).unwrap();
        assert!(config.enabled);
        assert_eq!(config.threshold_secs, 300);
    }

    #[test]
    #[serial]
    fn init_appends_audit_event() {
        let temp_dir = TempDir::new().unwrap();
        let _guard = DirGuard::new(temp_dir.path());

        cmd_init().unwrap();

        let ctx = TelemetryContext::resolve_from(temp_dir.path());
        let log = fs::read_to_string(ctx.events_file()).unwrap();
        assert!(log.contains("\"action\":\"init\""));
    }

    #[test]
    #[serial]
    fn init_refuses_when_already_initialized() {
        let temp_dir = TempDir::new().unwrap();
        let _guard = DirGuard::new(temp_dir.path());

        cmd_init().unwrap();
        let result = cmd_init();

        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("already initialized"));
    }
}
