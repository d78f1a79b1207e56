//! CLI argument parsing for lockstats.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};

/// Lockstats: lock usage telemetry for task runners.
///
/// Wraps a lock provider and records which resource keys are held, by whom
/// and for how long, with duration history aggregated per task. The CLI
/// manages the telemetry state directory and exposes the operator views
/// and overrides.
#[derive(Parser, Debug)]
#[command(name = "lockstats")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for lockstats.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize the telemetry state directory.
    ///
    /// Creates .lockstats/ with a default config.yaml, empty task files,
    /// and the locks/ and events/ directories.
    Init,

    /// List currently open locks.
    ///
    /// Shows open locks oldest first with holder, age and task identity.
    /// Locks held beyond the stale window carry a [STALE] marker.
    List,

    /// Show the slowest completed lock episodes.
    ///
    /// Aggregated history rows released within the window, slowest first.
    History(HistoryArgs),

    /// Show per-task lock counters.
    ///
    /// One row per ad hoc task classname: queued, running, processed,
    /// failed, and latency statistics.
    Tasks,

    /// Force-release a lock by resource key.
    ///
    /// Evicts whatever holds the lock at the provider and marks the
    /// telemetry row released. Requires --force.
    Release(ReleaseArgs),

    /// Clear all telemetry state.
    ///
    /// Empties the current and history tables. Requires --force.
    Reset(ResetArgs),

    /// Prune old history entries.
    ///
    /// Deletes history rows released longer ago than the retention window.
    Clean(CleanArgs),

    /// Check for stale locks.
    ///
    /// Reports locks held beyond the stale window; exits nonzero when any
    /// are found.
    Check,
}

/// Arguments for the `history` command.
#[derive(Parser, Debug)]
pub struct HistoryArgs {
    /// Maximum number of rows to show.
    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    /// Only include rows released within the last N days.
    #[arg(long, default_value_t = 7)]
    pub days: u32,
}

/// Arguments for the `release` command.
#[derive(Parser, Debug)]
pub struct ReleaseArgs {
    /// Resource key to release.
    pub resourcekey: Option<String>,

    /// Release every currently open lock instead of a single key.
    #[arg(long)]
    pub all: bool,

    /// Force the release (required for safety).
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `reset` command.
#[derive(Parser, Debug)]
pub struct ResetArgs {
    /// Force the reset (required for safety).
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `clean` command.
#[derive(Parser, Debug)]
pub struct CleanArgs {
    /// Override the configured retention window in days.
    #[arg(long)]
    pub days: Option<u32>,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
