//! Telemetry stores for lockstats.
//!
//! This module owns the two persisted views of lock usage:
//! - Current-state table (`current.json`): one row per resource key,
//!   upserted on every grant and marked released in place
//! - History table (`history.json`): completed episodes aggregated by task
//!   with threshold bucketing
//!
//! `TelemetryStore` is the capture-side facade: `on_gain` and `on_release`
//! implement the full telemetry write for one lock operation, including task
//! identity resolution, the exclusion list and the history handoff. Readers
//! (reports, the stale check) use the table handles directly.

mod current;
mod history;
pub mod types;


pub use current::CurrentTable;
pub use history::{HistoryOutcome, HistoryTable};
pub use types::{HistoryEntry, LockEpisode, format_age};

use crate::config::Config;
use crate::context::TelemetryContext;
use crate::error::Result;
use crate::registry::{TaskIdentity, TaskKind, TaskRegistry};
use chrono::{DateTime, Utc};

/// Facade over the telemetry tables for the capture path.
#[derive(Debug)]
pub struct TelemetryStore {
    current: CurrentTable,
    history: HistoryTable,
    registry: TaskRegistry,
    config: Config,
}

impl TelemetryStore {
    /// Create a store over the context's table paths.
    pub fn new(ctx: &TelemetryContext, config: Config) -> Self {
        Self {
            current: CurrentTable::new(ctx),
            history: HistoryTable::new(ctx),
            registry: TaskRegistry::new(ctx),
            config,
        }
    }

    /// The current-state table.
    pub fn current(&self) -> &CurrentTable {
        &self.current
    }

    /// The history table.
    pub fn history(&self) -> &HistoryTable {
        &self.history
    }

    /// Record a successful grant for `resourcekey`.
    ///
    /// The key is classified once here and the resulting tag carried on the
    /// row. An unresolvable identity never blocks recording: the row keeps
    /// `None` enrichment fields and, for `adhoc_<id>` shaped keys, still
    /// carries the adhoc tag.
    pub fn on_gain(&self, resourcekey: &str, now: DateTime<Utc>) -> Result<LockEpisode> {
        let identity = match self.registry.classify(resourcekey) {
            Ok(identity) => identity,
            Err(err) => {
                eprintln!(
                    "Warning: failed to resolve task identity for '{}': {}",
                    resourcekey, err
                );
                let kind = if TaskRegistry::adhoc_id(resourcekey).is_some() {
                    TaskKind::Adhoc
                } else {
                    TaskKind::Unknown
                };
                TaskIdentity {
                    kind,
                    ..TaskIdentity::unknown()
                }
            }
        };

        let episode = self.current.upsert_gain(resourcekey, &identity, now)?;

        if self.config.debug {
            eprintln!("lockstats [lock gained]: {}", resourcekey);
        }

        Ok(episode)
    }

    /// Record a release for `resourcekey`.
    ///
    /// Marks the current row released and hands the completed episode to the
    /// history table, unless the key is on the exclusion list. Returns the
    /// completed episode, or `None` when no open row existed (double release
    /// or a key this store never saw) in which case nothing is written.
    pub fn on_release(&self, resourcekey: &str, now: DateTime<Utc>) -> Result<Option<LockEpisode>> {
        let Some(episode) = self.current.mark_released(resourcekey, now)? else {
            return Ok(None);
        };

        if self.config.debug {
            eprintln!("lockstats [lock released]: {}", resourcekey);
        }

        if self.config.is_excluded(resourcekey) {
            if self.config.debug {
                eprintln!("lockstats [history skipped]: {}", resourcekey);
            }
            return Ok(Some(episode));
        }

        let threshold = self.config.threshold_secs as i64;
        match self.history.record(&episode, threshold, now)? {
            HistoryOutcome::New(id) => {
                if self.config.debug {
                    eprintln!("lockstats [history new]: {} (row {})", resourcekey, id);
                }
            }
            HistoryOutcome::Folded(id) => {
                if self.config.debug {
                    eprintln!("lockstats [history fold]: {} (row {})", resourcekey, id);
                }
            }
        }

        Ok(Some(episode))
    }

    /// All open rows, ordered oldest grant first.
    pub fn list_open(&self) -> Result<Vec<LockEpisode>> {
        self.current.list_open()
    }
}
