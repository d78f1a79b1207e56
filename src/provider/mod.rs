//! Lock providers for lockstats.
//!
//! The telemetry proxy wraps any `LockProvider` implementation; exclusion
//! semantics live entirely here, telemetry entirely in the proxy and stores.
//!
//! # Lock Files
//!
//! The bundled `FileLockProvider` keeps one file per held key under the
//! state directory's `locks/` folder, created with **create_new** semantics
//! so only one process can hold a key at a time. Resource keys are
//! percent-encoded into safe filenames.
//!
//! # Grant Lifetime
//!
//! Every grant carries an `expires_at`; once passed, any acquirer may evict
//! the file and take the key over. Tokens tie a handle to one specific
//! grant, so an evicted holder's release or extend reports false instead of
//! touching the new holder's lock.

mod file;
mod types;

#[cfg(test)]
mod tests;

// Re-export public API
pub use file::{FileLockProvider, LockFileMetadata};
pub use types::{LockProvider, ProviderHandle};
