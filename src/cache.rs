//! Semantic Cache (spec.md §4.11). Bounded LRU+TTL cache keyed by
//! `(policy hash, document-structure hash)` storing an applied-span list
//! so a repeat document shape can skip detection entirely. The LRU
//! eviction mechanics (parallel `map` + `order` vec, move-to-front on
//! hit) are ported from `fuzzy.rs`'s `LruCache`; TTL expiry is new, since
//! the teacher's query cache never needed one.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::span::Span;

#[derive(Clone)]
pub struct CacheEntry {
    pub applied_spans: Vec<Span>,
    pub redacted_text: String,
    inserted_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub policy_hash: u64,
    pub structure_hash: u64,
}

struct LruStore {
    capacity: usize,
    ttl: Duration,
    map: HashMap<CacheKey, CacheEntry>,
    order: Vec<CacheKey>,
}

impl LruStore {
    fn new(capacity: usize, ttl: Duration) -> Self {
        Self { capacity, ttl, map: HashMap::with_capacity(capacity), order: Vec::with_capacity(capacity) }
    }

    /// Never returns a stale entry (spec.md §4.11): an expired hit is
    /// evicted on the way out rather than returned.
    fn get(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.map.get(key)?;
        if entry.inserted_at.elapsed() > self.ttl {
            self.map.remove(key);
            if let Some(pos) = self.order.iter().position(|k| k == key) {
                self.order.remove(pos);
            }
            return None;
        }
        let value = entry.clone();
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
            self.order.push(*key);
        }
        Some(value)
    }

    fn insert(&mut self, key: CacheKey, entry: CacheEntry) {
        if self.map.len() >= self.capacity && !self.map.contains_key(&key) {
            if let Some(oldest) = self.order.first().copied() {
                self.map.remove(&oldest);
                self.order.remove(0);
            }
        }
        if let Some(pos) = self.order.iter().position(|k| *k == key) {
            self.order.remove(pos);
        }
        self.map.insert(key, entry);
        self.order.push(key);
    }
}

/// Thread-safe handle around the LRU store (spec.md §5: "single lock for
/// update; reads lock-free where supported, otherwise under the same
/// lock" — this crate uses the same lock for both, the simpler and
/// correct-by-construction choice).
pub struct SemanticCache {
    store: Mutex<LruStore>,
    min_doc_len: usize,
}

pub struct CacheLookup {
    pub entry: Option<CacheEntry>,
    pub lookup_time: Duration,
}

impl SemanticCache {
    pub fn new(capacity: usize, ttl: Duration, min_doc_len: usize) -> Self {
        Self { store: Mutex::new(LruStore::new(capacity, ttl)), min_doc_len }
    }

    pub fn lookup(&self, key: CacheKey) -> CacheLookup {
        let started = Instant::now();
        let entry = self.store.lock().unwrap().get(&key);
        CacheLookup { entry, lookup_time: started.elapsed() }
    }

    /// Stores a pipeline result for documents at or above the configured
    /// length threshold (spec.md §4.11: "store occurs after a full
    /// pipeline run for documents above a length threshold").
    pub fn store(&self, key: CacheKey, doc_len: usize, applied_spans: Vec<Span>, redacted_text: String) {
        if doc_len < self.min_doc_len {
            return;
        }
        let entry = CacheEntry { applied_spans, redacted_text, inserted_at: Instant::now() };
        self.store.lock().unwrap().insert(key, entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::FilterType;

    fn key(p: u64, s: u64) -> CacheKey {
        CacheKey { policy_hash: p, structure_hash: s }
    }

    #[test]
    fn miss_on_empty_cache() {
        let cache = SemanticCache::new(10, Duration::from_secs(60), 0);
        assert!(cache.lookup(key(1, 1)).entry.is_none());
    }

    #[test]
    fn hit_after_store() {
        let cache = SemanticCache::new(10, Duration::from_secs(60), 0);
        let spans = vec![Span::new("x", 0, 1, FilterType::Name, 0.9, 60, "t")];
        cache.store(key(1, 1), 100, spans, "redacted".to_string());
        let hit = cache.lookup(key(1, 1));
        assert!(hit.entry.is_some());
        assert_eq!(hit.entry.unwrap().redacted_text, "redacted");
    }

    #[test]
    fn below_threshold_is_never_stored() {
        let cache = SemanticCache::new(10, Duration::from_secs(60), 1_000);
        cache.store(key(1, 1), 10, Vec::new(), "x".to_string());
        assert!(cache.lookup(key(1, 1)).entry.is_none());
    }

    #[test]
    fn expired_entry_is_not_returned() {
        let cache = SemanticCache::new(10, Duration::from_millis(1), 0);
        cache.store(key(1, 1), 100, Vec::new(), "x".to_string());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.lookup(key(1, 1)).entry.is_none());
    }

    #[test]
    fn capacity_evicts_oldest_entry() {
        let cache = SemanticCache::new(2, Duration::from_secs(60), 0);
        cache.store(key(1, 1), 10, Vec::new(), "a".to_string());
        cache.store(key(2, 2), 10, Vec::new(), "b".to_string());
        cache.store(key(3, 3), 10, Vec::new(), "c".to_string());
        assert!(cache.lookup(key(1, 1)).entry.is_none());
        assert!(cache.lookup(key(3, 3)).entry.is_some());
    }
}
