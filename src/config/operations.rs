//! Config loading, validation, and utility operations.

use super::model::Config;
use crate::error::{LockstatsError, Result};
use std::path::Path;

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the config.yaml file
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully loaded and validated config
    /// * `Err(LockstatsError::UserError)` - Parse error or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            LockstatsError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| LockstatsError::UserError(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            LockstatsError::UserError(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `threshold_secs` must be positive
    /// - `history_retention_days` must be positive
    /// - `exclusion_list` entries must be non-empty
    pub fn validate(&self) -> Result<()> {
        if self.threshold_secs == 0 {
            return Err(LockstatsError::UserError(
                "config validation failed: threshold_secs must be greater than 0".to_string(),
            ));
        }

        if self.history_retention_days == 0 {
            return Err(LockstatsError::UserError(
                "config validation failed: history_retention_days must be greater than 0"
                    .to_string(),
            ));
        }

        for entry in &self.exclusion_list {
            if entry.is_empty() {
                return Err(LockstatsError::UserError(
                    "config validation failed: exclusion_list entries must be non-empty"
                        .to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Whether a resourcekey is on the exclusion list (exact string match).
    pub fn is_excluded(&self, resourcekey: &str) -> bool {
        self.exclusion_list.iter().any(|e| e == resourcekey)
    }
}
