//! Bounded LRU Store
//!
//! Byte-capacity store with least-recently-used eviction. One instance backs
//! each namespace.
//!
//! # Design
//!
//! - Recency list plus key index from the `lru` crate, used in unbounded mode
//! - Byte accounting is done here: an entry weighs `key.len() + value.weight()`
//! - After every `add`, the oldest entries are evicted one at a time until
//!   `used_bytes <= capacity_bytes`
//! - A capacity of zero means unlimited
//!
//! The store is not internally synchronized; the owning namespace wraps it
//! in a mutex.

use std::fmt;

use lru::LruCache;

/// Values that know how many bytes they occupy
pub trait Weighted {
    /// Size in bytes counted against the store capacity
    fn weight(&self) -> usize;
}

/// Callback invoked with every evicted entry
pub type EvictionCallback<V> = Box<dyn FnMut(&str, &V) + Send>;

/// Store statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    /// Number of entries
    pub entries: usize,
    /// Bytes currently in use
    pub used_bytes: u64,
    /// Capacity in bytes (0 = unlimited)
    pub capacity_bytes: u64,
    /// Hit count
    pub hits: u64,
    /// Miss count
    pub misses: u64,
    /// Eviction count
    pub evictions: u64,
}

/// Byte-bounded LRU store
pub struct LruStore<V> {
    entries: LruCache<String, V>,
    capacity_bytes: u64,
    used_bytes: u64,
    on_evicted: Option<EvictionCallback<V>>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<V: Weighted> LruStore<V> {
    /// Create a store holding at most `capacity_bytes` (0 = unlimited)
    pub fn new(capacity_bytes: u64) -> Self {
        Self {
            entries: LruCache::unbounded(),
            capacity_bytes,
            used_bytes: 0,
            on_evicted: None,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Create a store that reports every eviction to `callback`
    pub fn with_eviction_callback(capacity_bytes: u64, callback: EvictionCallback<V>) -> Self {
        let mut store = Self::new(capacity_bytes);
        store.on_evicted = Some(callback);
        store
    }

    /// Look up a key, marking it most recently used on hit
    pub fn get(&mut self, key: &str) -> Option<&V> {
        match self.entries.get(key) {
            Some(value) => {
                self.hits += 1;
                Some(value)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Check whether a key is present without touching its recency
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    /// Insert or overwrite an entry, then evict until back under capacity
    pub fn add(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        let key_len = key.len() as u64;
        let weight = value.weight() as u64;

        match self.entries.put(key, value) {
            // Key bytes are already accounted for; only the value changed.
            Some(old) => self.used_bytes = self.used_bytes + weight - old.weight() as u64,
            None => self.used_bytes += key_len + weight,
        }

        while self.capacity_bytes != 0 && self.used_bytes > self.capacity_bytes {
            if !self.remove_oldest() {
                break;
            }
        }
    }

    /// Evict the least recently used entry. Returns `false` if the store was empty.
    pub fn remove_oldest(&mut self) -> bool {
        let Some((key, value)) = self.entries.pop_lru() else {
            return false;
        };

        self.used_bytes -= key.len() as u64 + value.weight() as u64;
        self.evictions += 1;

        if let Some(callback) = self.on_evicted.as_mut() {
            callback(&key, &value);
        }

        true
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes currently in use
    pub fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    /// Configured capacity (0 = unlimited)
    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    /// Get store statistics
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            entries: self.len(),
            used_bytes: self.used_bytes,
            capacity_bytes: self.capacity_bytes,
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
        }
    }
}

impl<V> fmt::Debug for LruStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruStore")
            .field("entries", &self.entries.len())
            .field("used_bytes", &self.used_bytes)
            .field("capacity_bytes", &self.capacity_bytes)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    struct Text(&'static str);

    impl Weighted for Text {
        fn weight(&self) -> usize {
            self.0.len()
        }
    }

    #[test]
    fn test_get_hit_and_miss() {
        let mut store = LruStore::new(0);
        store.add("key1", Text("1234"));

        assert_eq!(store.get("key1"), Some(&Text("1234")));
        assert_eq!(store.get("key2"), None);

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_size_accounting() {
        let mut store = LruStore::new(0);
        store.add("key1", Text("1234"));
        assert_eq!(store.used_bytes(), 8);

        // Overwrite charges only the value delta
        store.add("key1", Text("123456"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.used_bytes(), 10);

        store.add("key1", Text("1"));
        assert_eq!(store.used_bytes(), 5);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let (k1, k2, k3) = ("key1", "key2", "k3");
        let (v1, v2, v3) = (Text("value1"), Text("value2"), Text("v3"));
        let capacity = (k1.len() + k2.len() + v1.0.len() + v2.0.len()) as u64;

        let mut store = LruStore::new(capacity);
        store.add(k1, v1);
        store.add(k2, v2);
        store.add(k3, v3);

        assert!(!store.contains("key1"));
        assert!(store.contains("key2"));
        assert!(store.contains("k3"));
        assert_eq!(store.len(), 2);
        assert!(store.used_bytes() <= capacity);
    }

    #[test]
    fn test_get_protects_from_eviction() {
        let mut store = LruStore::new(12);
        store.add("a", Text("11111")); // 6 bytes
        store.add("b", Text("22222")); // 6 bytes

        // Touch "a" so "b" becomes the oldest
        store.get("a");
        store.add("c", Text("33333"));

        assert!(store.contains("a"));
        assert!(!store.contains("b"));
        assert!(store.contains("c"));
    }

    #[test]
    fn test_overwrite_counts_as_use() {
        let mut store = LruStore::new(12);
        store.add("a", Text("11111"));
        store.add("b", Text("22222"));
        store.add("a", Text("44444"));
        store.add("c", Text("33333"));

        assert!(store.contains("a"));
        assert!(!store.contains("b"));
    }

    #[test]
    fn test_eviction_callback() {
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&evicted);
        let callback: EvictionCallback<Text> = Box::new(move |key, _value| {
            sink.lock().unwrap().push(key.to_string());
        });

        let mut store = LruStore::with_eviction_callback(10, callback);
        store.add("key1", Text("123456"));
        store.add("k2", Text("k2"));
        store.add("k3", Text("k3"));
        store.add("k4", Text("k4"));

        assert_eq!(*evicted.lock().unwrap(), vec!["key1", "k2"]);
        assert_eq!(store.stats().evictions, 2);
    }

    #[test]
    fn test_zero_capacity_is_unlimited() {
        let mut store = LruStore::new(0);
        for i in 0..1000 {
            store.add(format!("key-{}", i), Text("value"));
        }
        assert_eq!(store.len(), 1000);
        assert_eq!(store.stats().evictions, 0);
    }

    #[test]
    fn test_oversized_entry_evicts_itself() {
        let mut store = LruStore::new(4);
        store.add("a", Text("1"));
        store.add("big", Text("0123456789"));

        assert!(store.is_empty());
        assert_eq!(store.used_bytes(), 0);
    }

    #[test]
    fn test_remove_oldest_on_empty_store() {
        let mut store: LruStore<Text> = LruStore::new(10);
        assert!(!store.remove_oldest());
    }
}
