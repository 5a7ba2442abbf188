//! Expiring memoization cache for aggregation results.
//!
//! Entries are stamped with the insertion time and checked lazily against a
//! caller-supplied `now` on every read; there are no background timers.
//! `clear` drops everything at once, for callers that know the underlying
//! session set changed.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

/// How long a computed aggregate stays valid.
pub const CACHE_TTL_MINUTES: i64 = 5;

#[derive(Debug, Clone)]
struct Entry<V> {
    inserted_at: DateTime<Utc>,
    value: V,
}

#[derive(Debug)]
pub struct TtlCache<V> {
    entries: HashMap<String, Entry<V>>,
    ttl: Duration,
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            ttl: Duration::minutes(CACHE_TTL_MINUTES),
        }
    }

    #[cfg(test)]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Look up a key, evicting it first if it has expired relative to `now`.
    pub fn get(&mut self, key: &str, now: DateTime<Utc>) -> Option<V> {
        if let Some(entry) = self.entries.get(key) {
            if now - entry.inserted_at < self.ttl {
                return Some(entry.value.clone());
            }
            self.entries.remove(key);
        }
        None
    }

    pub fn insert(&mut self, key: String, value: V, now: DateTime<Utc>) {
        self.entries.insert(
            key,
            Entry {
                inserted_at: now,
                value,
            },
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn returns_value_within_ttl() {
        let mut cache: TtlCache<u32> = TtlCache::new();
        cache.insert("k".to_string(), 7, t0());

        assert_eq!(cache.get("k", t0() + Duration::minutes(4)), Some(7));
    }

    #[test]
    fn evicts_after_ttl() {
        let mut cache: TtlCache<u32> = TtlCache::new();
        cache.insert("k".to_string(), 7, t0());

        assert_eq!(cache.get("k", t0() + Duration::minutes(5)), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn clear_empties_everything() {
        let mut cache: TtlCache<u32> = TtlCache::new();
        cache.insert("a".to_string(), 1, t0());
        cache.insert("b".to_string(), 2, t0());

        cache.clear();
        assert_eq!(cache.get("a", t0()), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn custom_ttl_respected() {
        let mut cache: TtlCache<u32> = TtlCache::with_ttl(Duration::seconds(30));
        cache.insert("k".to_string(), 7, t0());

        assert_eq!(cache.get("k", t0() + Duration::seconds(29)), Some(7));
        assert_eq!(cache.get("k", t0() + Duration::seconds(30)), None);
    }
}
