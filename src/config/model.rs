//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};

/// Configuration for the lockstats telemetry layer.
///
/// This struct represents the contents of `.lockstats/config.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Capture settings
    // =========================================================================
    /// Whether telemetry capture is active. When false, the proxy passes lock
    /// operations through to the provider but writes no telemetry, and the
    /// CLI prints a warning banner.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Emit per-operation trace lines to stderr.
    #[serde(default)]
    pub debug: bool,

    // =========================================================================
    // Aggregation settings
    // =========================================================================
    /// Cumulative seconds below which completed episodes fold into a shared
    /// history row instead of creating a new one.
    #[serde(default = "default_threshold_secs")]
    pub threshold_secs: u64,

    /// Resourcekeys whose episodes never reach the history table
    /// (exact string match). The current-state row is still updated.
    #[serde(default = "default_exclusion_list")]
    pub exclusion_list: Vec<String>,

    /// Days to keep completed history entries before `clean` prunes them.
    #[serde(default = "default_history_retention_days")]
    pub history_retention_days: u32,

    // =========================================================================
    // Environment settings
    // =========================================================================
    /// Live environment identity (e.g. the deployment base URL). Compared
    /// against the persisted identity at proxy construction; a mismatch
    /// purges the current-state table.
    #[serde(default)]
    pub base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            debug: false,
            threshold_secs: default_threshold_secs(),
            exclusion_list: default_exclusion_list(),
            history_retention_days: default_history_retention_days(),
            base_url: String::new(),
        }
    }
}
