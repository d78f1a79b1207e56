//! Lockstats: lock usage telemetry for task-runner lock providers.
//!
//! The proxy wraps a lock provider and records every grant and release into
//! a current-state table and an aggregated duration history, without ever
//! changing the provider's locking decisions. The `lockstats` binary reads
//! that state back: open locks, slowest episodes, ad hoc task counters, and
//! a stale-lock health check suitable for monitoring.

pub mod check;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod environment;
pub mod error;
pub mod events;
pub mod exit_codes;
pub mod fs;
pub mod provider;
pub mod proxy;
pub mod registry;
pub mod report;
pub mod store;

#[cfg(test)]
mod test_support;
