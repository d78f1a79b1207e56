//! The lock telemetry proxy.
//!
//! `TelemetryProxy` wraps a [`LockProvider`] and records usage telemetry as
//! a side effect of every grant and release. It is transparent to locking
//! semantics: the provider call always comes first, a denied acquire writes
//! nothing, and a telemetry failure is reported to stderr without ever
//! reaching the caller holding the lock.
//!
//! The proxy keeps an in-process stack of provider handles per resource key
//! so recursive grants release in order, and drains those stacks when it is
//! dropped. That cleanup is best effort; the provider's grant lifetime stays
//! the authoritative reclaim path for processes that die hard.

use crate::config::Config;
use crate::context::TelemetryContext;
use crate::environment;
use crate::error::Result;
use crate::provider::{LockProvider, ProviderHandle};
use crate::store::TelemetryStore;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Grant lifetime used when the caller does not pass one.
pub const DEFAULT_MAX_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Caller-facing handle for a lock granted through the proxy.
///
/// Presents only the resource key; the provider handle stays inside the
/// proxy's open-lock stack until release.
#[derive(Debug)]
pub struct ProxyLock {
    resourcekey: String,
}

impl ProxyLock {
    /// The resource key this lock was granted for.
    pub fn resourcekey(&self) -> &str {
        &self.resourcekey
    }
}

/// Instrumentation wrapper around a lock provider.
pub struct TelemetryProxy {
    provider: Box<dyn LockProvider>,
    config: Config,
    store: TelemetryStore,
    open: Mutex<HashMap<String, Vec<ProviderHandle>>>,
}

impl TelemetryProxy {
    /// Wrap `provider`, running the environment-identity guard once.
    pub fn new(
        ctx: &TelemetryContext,
        config: Config,
        provider: Box<dyn LockProvider>,
    ) -> Result<Self> {
        let store = TelemetryStore::new(ctx, config.clone());
        environment::ensure_consistent(ctx, &config, store.current())?;

        Ok(Self {
            provider,
            config,
            store,
            open: Mutex::new(HashMap::new()),
        })
    }

    /// Acquire `resourcekey` with the default grant lifetime.
    pub fn acquire(&self, resourcekey: &str, timeout: Duration) -> Result<Option<ProxyLock>> {
        self.acquire_with_lifetime(resourcekey, timeout, DEFAULT_MAX_LIFETIME)
    }

    /// Acquire `resourcekey`, waiting up to `timeout` for a grant held at
    /// most `maxlifetime`.
    ///
    /// The provider decides. A denied acquire returns `None` and writes no
    /// telemetry.
    pub fn acquire_with_lifetime(
        &self,
        resourcekey: &str,
        timeout: Duration,
        maxlifetime: Duration,
    ) -> Result<Option<ProxyLock>> {
        let Some(handle) = self.provider.acquire(resourcekey, timeout, maxlifetime)? else {
            return Ok(None);
        };

        self.open_stacks()
            .entry(resourcekey.to_string())
            .or_default()
            .push(handle);

        self.record_gain(resourcekey);

        Ok(Some(ProxyLock {
            resourcekey: resourcekey.to_string(),
        }))
    }

    /// Release a lock granted by this proxy.
    ///
    /// Pops the most recent provider handle for the key, releases it at the
    /// provider, then marks the telemetry row released regardless of the
    /// provider verdict: this process is done with the key even when the
    /// grant had already been reclaimed. Returns the provider verdict, or
    /// false when the key has no open handle here (double release).
    pub fn release(&self, lock: &ProxyLock) -> Result<bool> {
        let Some(handle) = self.pop_handle(&lock.resourcekey) else {
            return Ok(false);
        };

        let verdict = self.provider.release(&handle);
        self.record_release(&lock.resourcekey);
        verdict
    }

    /// Push out the expiry of the most recent grant for this lock's key.
    pub fn extend(&self, lock: &ProxyLock, maxlifetime: Duration) -> Result<bool> {
        let handle = self
            .open_stacks()
            .get(&lock.resourcekey)
            .and_then(|stack| stack.last())
            .cloned();
        match handle {
            Some(handle) => self.provider.extend(&handle, maxlifetime),
            None => Ok(false),
        }
    }

    /// Read access to the telemetry stores behind this proxy.
    pub fn store(&self) -> &TelemetryStore {
        &self.store
    }

    /// Whether the wrapped provider honors a wait timeout.
    pub fn supports_timeout(&self) -> bool {
        self.provider.supports_timeout()
    }

    /// Whether the wrapped provider grants a held key again to its holder.
    pub fn supports_recursion(&self) -> bool {
        self.provider.supports_recursion()
    }

    /// Whether the wrapped provider releases abandoned grants on its own.
    pub fn supports_auto_release(&self) -> bool {
        self.provider.supports_auto_release()
    }

    /// Whether the wrapped provider can currently serve locks.
    pub fn is_available(&self) -> bool {
        self.provider.is_available()
    }

    fn open_stacks(&self) -> MutexGuard<'_, HashMap<String, Vec<ProviderHandle>>> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pop_handle(&self, resourcekey: &str) -> Option<ProviderHandle> {
        let mut stacks = self.open_stacks();
        let stack = stacks.get_mut(resourcekey)?;
        let handle = stack.pop();
        if stack.is_empty() {
            stacks.remove(resourcekey);
        }
        handle
    }

    fn record_gain(&self, resourcekey: &str) {
        if !self.config.enabled {
            return;
        }
        if let Err(e) = self.store.on_gain(resourcekey, Utc::now()) {
            eprintln!(
                "Warning: failed to record lock gain for '{}': {}",
                resourcekey, e
            );
        }
    }

    fn record_release(&self, resourcekey: &str) {
        if !self.config.enabled {
            return;
        }
        if let Err(e) = self.store.on_release(resourcekey, Utc::now()) {
            eprintln!(
                "Warning: failed to record lock release for '{}': {}",
                resourcekey, e
            );
        }
    }
}

impl Drop for TelemetryProxy {
    /// Release everything still on the open-lock stacks.
    ///
    /// Runs on normal and panicking exits alike. Persistent handles or a
    /// caller error can skip the normal release path; without this the row
    /// stays open until the provider reclaims the grant.
    fn drop(&mut self) {
        let stacks = {
            let mut open = self.open_stacks();
            std::mem::take(&mut *open)
        };
        for (resourcekey, stack) in stacks {
            for handle in stack.into_iter().rev() {
                if let Err(e) = self.provider.release(&handle) {
                    eprintln!(
                        "Warning: failed to release lock '{}' on shutdown: {}",
                        resourcekey, e
                    );
                }
                self.record_release(&resourcekey);
            }
        }
    }
}
