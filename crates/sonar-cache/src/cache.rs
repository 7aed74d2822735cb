//! Key/value store with per-entry expiration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::trace;

use crate::clock::{SharedClock, SystemClock};

/// TTL value meaning "keep until overwritten or the process exits".
pub const NO_EXPIRATION: Duration = Duration::ZERO;

/// Cache shared across request handlers.
pub type SharedCache<V> = Arc<TtlCache<V>>;

/// A stored value and its deadline.
#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    /// `None` means the entry never expires.
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// Thread-safe key/value cache with per-entry expiration.
///
/// Every `set` replaces the whole entry under the write lock, so a `get`
/// racing a `set` on the same key observes either the old or the new value.
/// Expired entries are treated as absent on read and physically removed by
/// [`TtlCache::purge_expired`] or the next read of that key.
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: RwLock<HashMap<String, Entry<V>>>,
    clock: SharedClock,
}

impl<V: Clone> TtlCache<V> {
    /// Create an empty cache using the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty cache that reads time from `clock`.
    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// The clock this cache uses for expiry.
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Look up a live entry.
    ///
    /// Returns `None` if the key is absent or its deadline has passed.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }

        // Expired: drop it unless a writer replaced it in between.
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            trace!(key, "Evicting expired cache entry");
            entries.remove(key);
        }
        None
    }

    /// Store `value` under `key`, replacing any existing entry.
    ///
    /// A `ttl` of [`NO_EXPIRATION`] keeps the entry indefinitely, as does a
    /// ttl too large to represent as a deadline.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let expires_at = if ttl.is_zero() {
            None
        } else {
            self.clock.now().checked_add(ttl)
        };
        self.entries
            .write()
            .insert(key.into(), Entry { value, expires_at });
    }

    /// Remove an entry. Returns `true` if a live entry was removed.
    pub fn remove(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.entries
            .write()
            .remove(key)
            .is_some_and(|e| !e.is_expired(now))
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every expired entry and return how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        before - entries.len()
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn manual() -> (Arc<ManualClock>, TtlCache<String>) {
        let clock = Arc::new(ManualClock::new());
        let cache = TtlCache::with_clock(clock.clone());
        (clock, cache)
    }

    #[test]
    fn test_get_missing_key() {
        let cache: TtlCache<String> = TtlCache::new();
        assert_eq!(cache.get("nope"), None);
    }

    #[test]
    fn test_entry_readable_until_deadline() {
        let (clock, cache) = manual();
        cache.set("k", "v".to_string(), Duration::from_secs(10));

        clock.advance(Duration::from_secs(9));
        assert_eq!(cache.get("k").as_deref(), Some("v"));

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("k"), None);
        // Passively evicted on the read that found it expired
        assert!(cache.is_empty());
    }

    #[test]
    fn test_no_expiration_survives_any_elapsed_time() {
        let (clock, cache) = manual();
        cache.set("refresh", "r".to_string(), NO_EXPIRATION);

        clock.advance(Duration::from_secs(60 * 60 * 24 * 365));
        assert_eq!(cache.get("refresh").as_deref(), Some("r"));
    }

    #[test]
    fn test_unrepresentable_ttl_never_expires() {
        let (clock, cache) = manual();
        cache.set("k", "v".to_string(), Duration::MAX);

        clock.advance(Duration::from_secs(60 * 60 * 24 * 365));
        assert_eq!(cache.get("k").as_deref(), Some("v"));
    }

    #[test]
    fn test_set_overwrites_value_and_deadline() {
        let (clock, cache) = manual();
        cache.set("k", "old".to_string(), Duration::from_secs(5));
        cache.set("k", "new".to_string(), NO_EXPIRATION);

        clock.advance(Duration::from_secs(60));
        assert_eq!(cache.get("k").as_deref(), Some("new"));

        cache.set("k", "short".to_string(), Duration::from_secs(1));
        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_remove() {
        let (clock, cache) = manual();
        cache.set("a", "1".to_string(), NO_EXPIRATION);
        cache.set("b", "2".to_string(), Duration::from_secs(1));

        assert!(cache.remove("a"));
        assert!(!cache.remove("a"));

        clock.advance(Duration::from_secs(2));
        // Expired entries are not reported as removed
        assert!(!cache.remove("b"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let (clock, cache) = manual();
        cache.set("short", "1".to_string(), Duration::from_secs(1));
        cache.set("long", "2".to_string(), Duration::from_secs(100));
        cache.set("forever", "3".to_string(), NO_EXPIRATION);

        clock.advance(Duration::from_secs(5));
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("long").as_deref(), Some("2"));
    }

    #[test]
    fn test_concurrent_readers_see_whole_values() {
        let cache: Arc<TtlCache<String>> = Arc::new(TtlCache::new());
        cache.set("k", "a".repeat(64), NO_EXPIRATION);

        let writer = {
            let cache = cache.clone();
            std::thread::spawn(move || {
                for i in 0..500 {
                    let c = if i % 2 == 0 { "b" } else { "a" };
                    cache.set("k", c.repeat(64), NO_EXPIRATION);
                }
            })
        };

        for _ in 0..500 {
            let v = cache.get("k").unwrap();
            assert!(v == "a".repeat(64) || v == "b".repeat(64));
        }
        writer.join().unwrap();
    }
}
