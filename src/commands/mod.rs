//! Command implementations for lockstats.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations, plus the small helpers the handlers share.

mod check;
mod clean;
mod history;
mod init;
mod list;
mod release;
mod reset;
mod tasks;

use crate::cli::Command;
use crate::config::Config;
use crate::error::Result;

/// Dispatch a command to its implementation.
///
/// This is the main entry point for command execution. Each command
/// is routed to its handler function.
pub fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::Init => init::cmd_init(),
        Command::List => list::cmd_list(),
        Command::History(args) => history::cmd_history(args),
        Command::Tasks => tasks::cmd_tasks(),
        Command::Release(args) => release::cmd_release(args),
        Command::Reset(args) => reset::cmd_reset(args),
        Command::Clean(args) => clean::cmd_clean(args),
        Command::Check => check::cmd_check(),
    }
}

/// Print the disabled-telemetry banner when capture is switched off.
///
/// Every command except `init` calls this: with `enabled: false` the tables
/// stay silently empty, and an operator reading them should know why.
pub(crate) fn warn_if_disabled(config: &Config) {
    if !config.enabled {
        eprintln!("Warning: telemetry capture is disabled (enabled: false in config.yaml).");
        eprintln!("Locks are granted and released normally but nothing is recorded.");
    }
}
