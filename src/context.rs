//! State directory resolution for lockstats.
//!
//! This module provides the "environment resolution" layer that locates the
//! telemetry state directory from the current working directory or from the
//! `LOCKSTATS_DIR` environment variable.
//!
//! All lockstats commands must use this module to locate telemetry state,
//! ensuring that operations always target the same state directory
//! (`.lockstats/`) regardless of where the command is invoked from.

use crate::error::{LockstatsError, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Default state directory name relative to the working directory.
pub const DEFAULT_STATE_DIR: &str = ".lockstats";

/// Environment variable that overrides the state directory location.
pub const STATE_DIR_ENV: &str = "LOCKSTATS_DIR";

/// Resolved paths for the lockstats telemetry state.
///
/// This struct provides all the paths needed for lockstats operations.
#[derive(Debug, Clone)]
pub struct TelemetryContext {
    /// Path to the state directory (default: `{cwd}/.lockstats/`).
    pub state_dir: PathBuf,

    /// Path to the lock files directory (default: `{state_dir}/locks/`).
    pub locks_dir: PathBuf,
}

impl TelemetryContext {
    /// Resolve the telemetry context from the environment.
    ///
    /// If `LOCKSTATS_DIR` is set it is used as the state directory directly.
    /// Otherwise the state directory is `.lockstats/` under the current
    /// working directory.
    ///
    /// # Returns
    ///
    /// * `Ok(TelemetryContext)` - Successfully resolved context
    /// * `Err(LockstatsError::UserError)` - If the working directory cannot be determined
    pub fn resolve() -> Result<Self> {
        if let Ok(dir) = env::var(STATE_DIR_ENV)
            && !dir.is_empty()
        {
            return Ok(Self::from_state_dir(PathBuf::from(dir)));
        }

        let cwd = env::current_dir().map_err(|e| {
            LockstatsError::UserError(format!("failed to get current working directory: {}", e))
        })?;

        Ok(Self::resolve_from(&cwd))
    }

    /// Resolve the telemetry context relative to a specific base directory.
    ///
    /// This is useful for testing or when the working directory is known.
    pub fn resolve_from<P: AsRef<Path>>(base: P) -> Self {
        Self::from_state_dir(base.as_ref().join(DEFAULT_STATE_DIR))
    }

    /// Build a context from an explicit state directory path.
    pub fn from_state_dir(state_dir: PathBuf) -> Self {
        let locks_dir = state_dir.join("locks");
        Self {
            state_dir,
            locks_dir,
        }
    }

    /// Check if the state directory has been initialized.
    pub fn initialized(&self) -> bool {
        self.state_dir.exists() && self.config_path().exists()
    }

    /// Ensure the state directory is initialized, returning an error if not.
    ///
    /// This should be called by all commands except `init` to provide
    /// a helpful error message guiding users to run `lockstats init`.
    pub fn ensure_initialized(&self) -> Result<()> {
        if !self.state_dir.exists() {
            return Err(LockstatsError::UserError(format!(
                "lockstats state not initialized.\n\
                 Expected state directory at: {}\n\n\
                 Run `lockstats init` to set up telemetry state here.",
                self.state_dir.display()
            )));
        }

        if !self.config_path().exists() {
            return Err(LockstatsError::UserError(format!(
                "lockstats config file not found.\n\
                 Expected: {}\n\n\
                 Run `lockstats init` to set up telemetry state here.",
                self.config_path().display()
            )));
        }

        Ok(())
    }

    /// Get the path to the config file.
    pub fn config_path(&self) -> PathBuf {
        self.state_dir.join("config.yaml")
    }

    /// Get the path to the current-locks table.
    pub fn current_table_path(&self) -> PathBuf {
        self.state_dir.join("current.json")
    }

    /// Get the path to the lock history table.
    pub fn history_table_path(&self) -> PathBuf {
        self.state_dir.join("history.json")
    }

    /// Get the path to the recorded environment identity.
    pub fn environment_path(&self) -> PathBuf {
        self.state_dir.join("environment.json")
    }

    /// Get the path to the task definitions directory.
    pub fn tasks_dir(&self) -> PathBuf {
        self.state_dir.join("tasks")
    }

    /// Get the path to the ad hoc task backlog.
    pub fn adhoc_backlog_path(&self) -> PathBuf {
        self.tasks_dir().join("adhoc.json")
    }

    /// Get the path to the scheduled task registry.
    pub fn scheduled_registry_path(&self) -> PathBuf {
        self.tasks_dir().join("scheduled.json")
    }

    /// Get the path to the events directory.
    pub fn events_dir(&self) -> PathBuf {
        self.state_dir.join("events")
    }

    /// Get the path to the main events log file.
    pub fn events_file(&self) -> PathBuf {
        self.events_dir().join("events.ndjson")
    }
}

/// Convenience function to resolve context and ensure state is initialized.
///
/// Use this in most commands (except `init`) to get the telemetry context
/// with proper error handling for uninitialized state.
pub fn require_initialized() -> Result<TelemetryContext> {
    let ctx = TelemetryContext::resolve()?;
    ctx.ensure_initialized()?;
    Ok(ctx)
}
