use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;

/// Combined LRU+TTL cache for idempotent `IssClient` reads.
///
/// Entries are evicted by whichever limit is hit first: TTL expiry (checked lazily on
/// lookup, as the upstream `FailureCache` does) or LRU eviction once `max_size` is
/// exceeded. Keyed by `(operation, normalized-args)`, built via [`cache_key`].
pub struct IssCache {
    entries: DashMap<String, CacheEntry>,
    order: Mutex<VecDeque<String>>,
    ttl: Duration,
    max_size: usize,
}

struct CacheEntry {
    value: serde_json::Value,
    inserted_at: Instant,
}

/// Build a normalized cache key from an operation name and its arguments.
///
/// Arguments are joined in the order given by the caller (callers pass them in a
/// stable, already-sorted order) so the same logical request always hashes the same.
pub fn cache_key(operation: &str, args: &[(&str, &str)]) -> String {
    let mut key = operation.to_string();
    for (name, value) in args {
        key.push('|');
        key.push_str(name);
        key.push('=');
        key.push_str(value);
    }
    key
}

impl IssCache {
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        Self { entries: DashMap::new(), order: Mutex::new(VecDeque::new()), ttl, max_size }
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let entry = self.entries.get(key)?;
        if entry.inserted_at.elapsed() > self.ttl {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        let value = entry.value.clone();
        drop(entry);
        self.touch(key);
        Some(value)
    }

    pub fn insert(&self, key: String, value: serde_json::Value) {
        self.entries.insert(key.clone(), CacheEntry { value, inserted_at: Instant::now() });
        self.touch(&key);
        self.evict_if_over_capacity();
    }

    fn touch(&self, key: &str) {
        let mut order = self.order.lock();
        order.retain(|k| k != key);
        order.push_back(key.to_string());
    }

    fn evict_if_over_capacity(&self) {
        while self.entries.len() > self.max_size {
            let oldest = {
                let mut order = self.order.lock();
                order.pop_front()
            };
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cleanup_expired(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.inserted_at.elapsed() <= ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_retrieves_by_key() {
        let cache = IssCache::new(Duration::from_secs(60), 10);
        let key = cache_key("snapshot", &[("ticker", "SBER"), ("board", "TQBR")]);
        cache.insert(key.clone(), serde_json::json!({"last_price": 250.0}));
        assert_eq!(cache.get(&key).unwrap()["last_price"], 250.0);
    }

    #[test]
    fn expires_entries_past_ttl() {
        let cache = IssCache::new(Duration::from_millis(1), 10);
        let key = cache_key("snapshot", &[("ticker", "SBER")]);
        cache.insert(key.clone(), serde_json::json!(1));
        std::thread::sleep(Duration::from_millis(10));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn evicts_lru_entry_over_capacity() {
        let cache = IssCache::new(Duration::from_secs(60), 2);
        cache.insert("a".to_string(), serde_json::json!(1));
        cache.insert("b".to_string(), serde_json::json!(2));
        cache.get("a"); // touch a, making b the least-recently-used
        cache.insert("c".to_string(), serde_json::json!(3));
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
    }
}
