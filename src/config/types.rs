//! Configuration defaults for lockstats.

// Default value functions for serde
pub(crate) fn default_threshold_secs() -> u64 {
    300
}
pub(crate) fn default_exclusion_list() -> Vec<String> {
    vec!["core_cron".to_string()]
}
pub(crate) fn default_history_retention_days() -> u32 {
    30
}
pub(crate) fn default_true() -> bool {
    true
}
