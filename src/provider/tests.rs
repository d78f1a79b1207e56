//! Tests for the lock provider subsystem.

use super::file::{encode_key_filename, get_owner_string};
use super::*;
use crate::context::TelemetryContext;
use chrono::Utc;
use std::time::Duration;
use tempfile::TempDir;

fn test_provider() -> (TempDir, FileLockProvider) {
    let temp_dir = TempDir::new().unwrap();
    let ctx = TelemetryContext::resolve_from(temp_dir.path());
    let provider = FileLockProvider::new(&ctx);
    (temp_dir, provider)
}

const HOUR: Duration = Duration::from_secs(3600);

#[test]
fn test_acquire_creates_lock_file() {
    let (_temp_dir, provider) = test_provider();

    let handle = provider
        .acquire("adhoc_1", Duration::ZERO, HOUR)
        .unwrap()
        .unwrap();

    assert_eq!(handle.resourcekey, "adhoc_1");
    assert!(!handle.token.is_empty());

    let lock_path = provider.lock_path("adhoc_1");
    assert!(lock_path.exists());

    let meta = LockFileMetadata::from_file(&lock_path).unwrap();
    assert_eq!(meta.key, "adhoc_1");
    assert_eq!(meta.token, handle.token);
    assert_eq!(meta.pid, std::process::id());
    assert!(meta.owner.contains('@'));
    assert!(meta.expires_at > meta.created_at);
}

#[test]
fn test_second_acquire_times_out() {
    let (_temp_dir, provider) = test_provider();

    let _held = provider
        .acquire("adhoc_1", Duration::ZERO, HOUR)
        .unwrap()
        .unwrap();

    // No recursion: a held key cannot be acquired again
    let denied = provider
        .acquire("adhoc_1", Duration::from_millis(120), HOUR)
        .unwrap();
    assert!(denied.is_none());
}

#[test]
fn test_different_keys_are_independent() {
    let (_temp_dir, provider) = test_provider();

    let a = provider.acquire("adhoc_1", Duration::ZERO, HOUR).unwrap();
    let b = provider.acquire("adhoc_2", Duration::ZERO, HOUR).unwrap();

    assert!(a.is_some());
    assert!(b.is_some());
}

#[test]
fn test_release_removes_lock_file() {
    let (_temp_dir, provider) = test_provider();

    let handle = provider
        .acquire("adhoc_1", Duration::ZERO, HOUR)
        .unwrap()
        .unwrap();

    assert!(provider.release(&handle).unwrap());
    assert!(!provider.lock_path("adhoc_1").exists());

    // Second release: nothing left to release
    assert!(!provider.release(&handle).unwrap());
}

#[test]
fn test_release_checks_token() {
    let (_temp_dir, provider) = test_provider();

    let handle = provider
        .acquire("adhoc_1", Duration::ZERO, HOUR)
        .unwrap()
        .unwrap();

    let foreign = ProviderHandle {
        resourcekey: "adhoc_1".to_string(),
        token: "someone-else".to_string(),
    };

    // A foreign token must not remove the holder's file
    assert!(!provider.release(&foreign).unwrap());
    assert!(provider.lock_path("adhoc_1").exists());

    assert!(provider.release(&handle).unwrap());
}

#[test]
fn test_expired_lock_is_reclaimed() {
    let (_temp_dir, provider) = test_provider();

    let original = provider
        .acquire("adhoc_1", Duration::ZERO, Duration::from_millis(80))
        .unwrap()
        .unwrap();

    std::thread::sleep(Duration::from_millis(120));

    // The grant has expired, so a waiting acquirer takes it over
    let reclaimer = provider
        .acquire("adhoc_1", Duration::from_millis(500), HOUR)
        .unwrap()
        .unwrap();
    assert_ne!(reclaimer.token, original.token);

    // The evicted holder's release finds a foreign token
    assert!(!provider.release(&original).unwrap());
    assert!(provider.release(&reclaimer).unwrap());
}

#[test]
fn test_evict_expired_claims_stale_grant() {
    let (_temp_dir, provider) = test_provider();

    let _original = provider
        .acquire("adhoc_1", Duration::ZERO, Duration::from_millis(80))
        .unwrap()
        .unwrap();

    std::thread::sleep(Duration::from_millis(120));

    let stale = LockFileMetadata::from_file(provider.lock_path("adhoc_1")).unwrap();
    assert!(provider.evict_expired("adhoc_1", &stale));
    assert!(!provider.lock_path("adhoc_1").exists());

    // Losing the same eviction a second time: the file is already gone
    assert!(!provider.evict_expired("adhoc_1", &stale));

    // No staging litter left behind
    let locks_dir = provider.lock_path("adhoc_1").parent().unwrap().to_path_buf();
    assert_eq!(std::fs::read_dir(&locks_dir).unwrap().count(), 0);
}

#[test]
fn test_evict_expired_spares_fresh_grant() {
    let (_temp_dir, provider) = test_provider();

    let original = provider
        .acquire("adhoc_1", Duration::ZERO, Duration::from_millis(80))
        .unwrap()
        .unwrap();

    std::thread::sleep(Duration::from_millis(120));

    // A slow contender reads the expired metadata...
    let stale = LockFileMetadata::from_file(provider.lock_path("adhoc_1")).unwrap();
    assert!(stale.is_expired(Utc::now()));

    // ...then stalls while a faster contender reclaims the key
    let winner = provider
        .acquire("adhoc_1", Duration::from_millis(500), HOUR)
        .unwrap()
        .unwrap();

    // The stalled eviction lands on the fresh grant and must leave it alone
    assert!(!provider.evict_expired("adhoc_1", &stale));

    let on_disk = LockFileMetadata::from_file(provider.lock_path("adhoc_1")).unwrap();
    assert_eq!(on_disk.token, winner.token);

    let locks_dir = provider.lock_path("adhoc_1").parent().unwrap().to_path_buf();
    assert_eq!(std::fs::read_dir(&locks_dir).unwrap().count(), 1);

    // The winner still holds; the expired handle lost the key
    assert!(!provider.release(&original).unwrap());
    assert!(provider.release(&winner).unwrap());
}

#[test]
fn test_extend_pushes_out_expiry() {
    let (_temp_dir, provider) = test_provider();

    let handle = provider
        .acquire("adhoc_1", Duration::ZERO, Duration::from_secs(1))
        .unwrap()
        .unwrap();

    let before = LockFileMetadata::from_file(provider.lock_path("adhoc_1")).unwrap();
    assert!(provider.extend(&handle, HOUR).unwrap());
    let after = LockFileMetadata::from_file(provider.lock_path("adhoc_1")).unwrap();

    assert!(after.expires_at > before.expires_at);
    // The grant itself is unchanged
    assert_eq!(after.token, before.token);
}

#[test]
fn test_extend_fails_after_reclaim() {
    let (_temp_dir, provider) = test_provider();

    let original = provider
        .acquire("adhoc_1", Duration::ZERO, Duration::from_millis(80))
        .unwrap()
        .unwrap();

    std::thread::sleep(Duration::from_millis(120));

    let _reclaimer = provider
        .acquire("adhoc_1", Duration::from_millis(500), HOUR)
        .unwrap()
        .unwrap();

    assert!(!provider.extend(&original, HOUR).unwrap());
}

#[test]
fn test_force_release_evicts_any_holder() {
    let (_temp_dir, provider) = test_provider();

    let handle = provider
        .acquire("adhoc_1", Duration::ZERO, HOUR)
        .unwrap()
        .unwrap();

    let evicted = provider.force_release("adhoc_1").unwrap();
    assert_eq!(evicted, Some(get_owner_string()));
    assert!(!provider.lock_path("adhoc_1").exists());

    // The evicted handle can no longer release anything
    assert!(!provider.release(&handle).unwrap());
}

#[test]
fn test_force_release_without_holder() {
    let (_temp_dir, provider) = test_provider();

    assert_eq!(provider.force_release("never_locked").unwrap(), None);
}

#[test]
fn test_acquire_key_with_unsafe_characters() {
    let (_temp_dir, provider) = test_provider();

    let key = "core\\task\\cache cleanup/v2";
    let handle = provider.acquire(key, Duration::ZERO, HOUR).unwrap().unwrap();

    // The lock file lands inside the locks directory despite the slashes
    let lock_path = provider.lock_path(key);
    assert!(lock_path.exists());
    assert!(lock_path.parent().unwrap().ends_with("locks"));

    assert!(provider.release(&handle).unwrap());
}

#[test]
fn test_encode_key_filename() {
    assert_eq!(encode_key_filename("adhoc_42"), "adhoc_42");
    assert_eq!(encode_key_filename("a.b-c_d"), "a.b-c_d");

    assert_eq!(encode_key_filename("a/b"), "a%2Fb");
    assert_eq!(encode_key_filename("a b"), "a%20b");
    assert_eq!(encode_key_filename("a%b"), "a%25b");
    assert_eq!(encode_key_filename("core\\task"), "core%5Ctask");

    // Distinct keys never collide
    assert_ne!(encode_key_filename("a/b"), encode_key_filename("a%2Fb"));
}

#[test]
fn test_capabilities() {
    let (_temp_dir, provider) = test_provider();

    assert!(provider.supports_timeout());
    assert!(!provider.supports_recursion());
    assert!(!provider.supports_auto_release());
    assert!(provider.is_available());
}

#[test]
fn test_metadata_expiry() {
    let (_temp_dir, provider) = test_provider();

    provider.acquire("adhoc_1", Duration::ZERO, HOUR).unwrap();
    let meta = LockFileMetadata::from_file(provider.lock_path("adhoc_1")).unwrap();

    assert!(!meta.is_expired(Utc::now()));
    assert!(meta.is_expired(meta.expires_at + chrono::Duration::seconds(1)));
}

#[test]
fn test_get_owner_string() {
    let owner = get_owner_string();
    assert!(owner.contains('@'));
    assert!(!owner.is_empty());
}
