//! Lock provider trait and handle definitions.

use crate::error::Result;
use std::time::Duration;

/// Handle to one granted lock at the provider.
///
/// The token identifies a specific grant: a handle whose grant has been
/// reclaimed or force-released no longer releases anything.
#[derive(Debug, Clone)]
pub struct ProviderHandle {
    /// The resource key the grant is for.
    pub resourcekey: String,

    /// Provider-assigned token for this grant.
    pub token: String,
}

/// The mutual-exclusion primitive the telemetry proxy wraps.
///
/// Implementations own all actual exclusion semantics; the proxy passes
/// acquire/release through unchanged and records telemetry as a side effect.
pub trait LockProvider: Send + Sync {
    /// Try to acquire `resourcekey`, waiting up to `timeout`.
    ///
    /// Returns `None` when the lock could not be obtained in time. A grant
    /// is held for at most `maxlifetime` before other acquirers may reclaim
    /// it.
    fn acquire(
        &self,
        resourcekey: &str,
        timeout: Duration,
        maxlifetime: Duration,
    ) -> Result<Option<ProviderHandle>>;

    /// Release a granted handle.
    ///
    /// Returns false when the grant was no longer held (already released,
    /// reclaimed, or force-released).
    fn release(&self, handle: &ProviderHandle) -> Result<bool>;

    /// Push out the expiry of a granted handle by `maxlifetime` from now.
    ///
    /// Returns false when the grant was no longer held.
    fn extend(&self, handle: &ProviderHandle, maxlifetime: Duration) -> Result<bool>;

    /// Unconditionally evict whatever currently holds `resourcekey`.
    ///
    /// Operator override for stuck locks. Returns a description of the
    /// evicted owner, or `None` when nothing held the key.
    fn force_release(&self, resourcekey: &str) -> Result<Option<String>>;

    /// Whether `acquire` honors a wait timeout.
    fn supports_timeout(&self) -> bool;

    /// Whether the same caller may acquire a held key again.
    fn supports_recursion(&self) -> bool;

    /// Whether abandoned grants are released without a reclaim step.
    fn supports_auto_release(&self) -> bool;

    /// Whether the provider can currently serve locks at all.
    fn is_available(&self) -> bool;
}
