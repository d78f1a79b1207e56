//! Exit code constants for the lockstats CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid state)
//! - 2: Validation failure (stale-lock check reported ERROR)
//! - 3: Telemetry storage failure
//! - 4: Lock operation failure

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, missing state directory, invalid config.
pub const USER_ERROR: i32 = 1;

/// Validation failure: the stale-lock health check reported ERROR.
pub const VALIDATION_FAILURE: i32 = 2;

/// Telemetry storage failure: a table file could not be read or written.
pub const STORAGE_FAILURE: i32 = 3;

/// Lock operation failure: the provider could not acquire or release.
pub const LOCK_FAILURE: i32 = 4;
