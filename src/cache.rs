//! Short-lived value cache with lazy expiry.
//!
//! Values live under an `id` (typically a site or course identifier) and a
//! `name` within that id. A value is fresh while
//! `now - timemodified < CACHE_TTL`. Nothing is swept; expiry is only
//! evaluated on read, and invalidation keeps the stored value around so
//! callers can still fall back to the last known one.

use crate::clock::{Clock, SystemClock};
use dashmap::DashMap;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// How long a cached value stays fresh.
pub const CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// A stored value and the time it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheValue<V> {
    pub value: V,
    /// Milliseconds since the Unix epoch; zero once invalidated. Stored
    /// values are stamped at least 1 so zero only ever means invalidated.
    pub timemodified: i64,
}

/// TTL cache keyed by `(id, name)`.
pub struct TtlCache<K, V> {
    entries: DashMap<K, HashMap<String, CacheValue<V>>>,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Create a cache backed by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a cache with a custom clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Get a value.
    ///
    /// Returns `None` when nothing is stored, or when the value is expired
    /// and `ignore_invalidate` is false.
    pub fn get_value(&self, id: &K, name: &str, ignore_invalidate: bool) -> Option<V> {
        let entry = self.entries.get(id)?;
        let cached = entry.get(name)?;

        if ignore_invalidate || self.is_fresh(cached.timemodified) {
            return Some(cached.value.clone());
        }

        trace!(name = %name, "Cache value expired");
        None
    }

    /// Store a value, stamping it with the current time. Returns the value.
    pub fn set_value(&self, id: K, name: impl Into<String>, value: V) -> V {
        let timemodified = self.clock.now_millis().max(1);
        self.entries.entry(id).or_default().insert(
            name.into(),
            CacheValue {
                value: value.clone(),
                timemodified,
            },
        );
        value
    }

    /// Snapshot every named value under `id`, fresh or not.
    pub fn get_entry(&self, id: &K) -> HashMap<String, CacheValue<V>> {
        self.entries
            .get(id)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    /// Expire every value under `id` without dropping it.
    pub fn invalidate(&self, id: &K) {
        if let Some(mut entry) = self.entries.get_mut(id) {
            for cached in entry.values_mut() {
                cached.timemodified = 0;
            }
        }
    }

    /// Expire every value under each id matching `pred`.
    pub fn invalidate_matching<F>(&self, pred: F)
    where
        F: Fn(&K) -> bool,
    {
        for mut entry in self.entries.iter_mut() {
            if pred(entry.key()) {
                for cached in entry.value_mut().values_mut() {
                    cached.timemodified = 0;
                }
            }
        }
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of ids with stored values.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_fresh(&self, timemodified: i64) -> bool {
        timemodified != 0
            && self.clock.now_millis() - timemodified < CACHE_TTL.as_millis() as i64
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn cache_at(start: i64) -> (Arc<ManualClock>, TtlCache<u32, i32>) {
        let clock = Arc::new(ManualClock::new(start));
        let cache = TtlCache::with_clock(clock.clone());
        (clock, cache)
    }

    #[test]
    fn test_set_then_get() {
        let (_, cache) = cache_at(1_000_000);
        assert_eq!(cache.set_value(7, "x", 1), 1);
        assert_eq!(cache.get_value(&7, "x", false), Some(1));
        assert_eq!(cache.get_value(&7, "y", false), None);
        assert_eq!(cache.get_value(&8, "x", false), None);
    }

    #[test]
    fn test_expires_after_ttl() {
        let (clock, cache) = cache_at(1_000_000);
        cache.set_value(7, "x", 1);

        clock.advance(CACHE_TTL - Duration::from_millis(1));
        assert_eq!(cache.get_value(&7, "x", false), Some(1));

        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get_value(&7, "x", false), None);
        assert_eq!(cache.get_value(&7, "x", true), Some(1));
    }

    #[test]
    fn test_set_refreshes_timestamp() {
        let (clock, cache) = cache_at(1_000_000);
        cache.set_value(7, "x", 1);
        clock.advance(CACHE_TTL);
        cache.set_value(7, "x", 2);
        assert_eq!(cache.get_value(&7, "x", false), Some(2));
    }

    #[test]
    fn test_invalidate_keeps_value() {
        let (_, cache) = cache_at(1_000_000);
        cache.set_value(7, "x", 1);
        cache.set_value(7, "y", 2);
        cache.set_value(8, "x", 3);

        cache.invalidate(&7);

        assert_eq!(cache.get_value(&7, "x", false), None);
        assert_eq!(cache.get_value(&7, "y", false), None);
        assert_eq!(cache.get_value(&7, "x", true), Some(1));
        assert_eq!(cache.get_value(&8, "x", false), Some(3));

        let entry = cache.get_entry(&7);
        assert_eq!(entry.len(), 2);
        assert!(entry.values().all(|v| v.timemodified == 0));
    }

    #[test]
    fn test_invalidate_expires_with_early_clock() {
        let (clock, cache) = cache_at(0);
        cache.set_value(7, "x", 1);
        assert_eq!(cache.get_value(&7, "x", false), Some(1));

        clock.advance(Duration::from_secs(1));
        cache.invalidate(&7);
        assert_eq!(cache.get_value(&7, "x", false), None);
        assert_eq!(cache.get_value(&7, "x", true), Some(1));
    }

    #[test]
    fn test_invalidate_unknown_id_is_noop() {
        let (_, cache) = cache_at(0);
        cache.invalidate(&42);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_matching() {
        let (_, cache) = cache_at(1_000_000);
        cache.set_value(1, "x", 1);
        cache.set_value(2, "x", 2);
        cache.set_value(3, "x", 3);

        cache.invalidate_matching(|id| id % 2 == 1);

        assert_eq!(cache.get_value(&1, "x", false), None);
        assert_eq!(cache.get_value(&2, "x", false), Some(2));
        assert_eq!(cache.get_value(&3, "x", false), None);
        assert_eq!(cache.get_value(&3, "x", true), Some(3));
    }

    #[test]
    fn test_clear() {
        let (_, cache) = cache_at(1_000_000);
        cache.set_value(7, "x", 1);
        cache.set_value(8, "x", 1);
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get_value(&7, "x", true), None);
    }
}
