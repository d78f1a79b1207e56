//! Filesystem utilities for lockstats.
//!
//! This module provides safe filesystem operations, particularly atomic writes
//! that are essential for keeping the telemetry tables consistent.

pub mod atomic;

pub use atomic::atomic_write;
pub use atomic::atomic_write_file;
