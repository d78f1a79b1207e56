//! Error types for the lockstats CLI.
//!
//! Uses thiserror for derive macros and provides user-actionable error messages.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for lockstats operations.
///
/// Each variant maps to a specific exit code.
#[derive(Error, Debug)]
pub enum LockstatsError {
    /// User provided invalid arguments or the system is in an invalid state.
    #[error("{0}")]
    UserError(String),

    /// A health check reported failures.
    #[error("Validation failed: {0}")]
    ValidationError(String),

    /// A telemetry table or state file could not be read or written.
    #[error("Telemetry storage failed: {0}")]
    StorageError(String),

    /// A provider lock operation failed.
    #[error("Lock operation failed: {0}")]
    LockError(String),
}

impl LockstatsError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LockstatsError::UserError(_) => exit_codes::USER_ERROR,
            LockstatsError::ValidationError(_) => exit_codes::VALIDATION_FAILURE,
            LockstatsError::StorageError(_) => exit_codes::STORAGE_FAILURE,
            LockstatsError::LockError(_) => exit_codes::LOCK_FAILURE,
        }
    }
}

/// Result type alias for lockstats operations.
pub type Result<T> = std::result::Result<T, LockstatsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_error_has_correct_exit_code() {
        let err = LockstatsError::UserError("bad argument".to_string());
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
    }

    #[test]
    fn validation_error_has_correct_exit_code() {
        let err = LockstatsError::ValidationError("stale locks present".to_string());
        assert_eq!(err.exit_code(), exit_codes::VALIDATION_FAILURE);
    }

    #[test]
    fn storage_error_has_correct_exit_code() {
        let err = LockstatsError::StorageError("current.json unreadable".to_string());
        assert_eq!(err.exit_code(), exit_codes::STORAGE_FAILURE);
    }

    #[test]
    fn lock_error_has_correct_exit_code() {
        let err = LockstatsError::LockError("could not create lock file".to_string());
        assert_eq!(err.exit_code(), exit_codes::LOCK_FAILURE);
    }

    #[test]
    fn error_messages_are_descriptive() {
        let err = LockstatsError::ValidationError("2 stale lock(s)".to_string());
        assert_eq!(err.to_string(), "Validation failed: 2 stale lock(s)");

        let err = LockstatsError::StorageError("disk full".to_string());
        assert_eq!(err.to_string(), "Telemetry storage failed: disk full");
    }
}
