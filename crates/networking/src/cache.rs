//! Time-bounded in-memory cache
//!
//! Entries are fresh while their age is strictly below the TTL. Expired
//! entries are dropped lazily on lookup or eagerly by
//! [`TtlCache::cleanup_expired`].

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;

/// Default time-to-live for cached entries
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Configuration for the TTL cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Default TTL for cached entries
    pub default_ttl: Duration,
    /// Maximum number of entries
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            max_entries: 256,
        }
    }
}

/// Cached value with timing metadata
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    /// When this entry was created
    pub created_at: Instant,
    pub ttl: Duration,
    /// Access count for LRU eviction
    pub access_count: u64,
    /// Last access time for LRU eviction
    pub last_accessed: Instant,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            value,
            created_at: now,
            ttl,
            access_count: 0,
            last_accessed: now,
        }
    }

    /// Get the age of this entry
    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.created_at)
    }

    /// Check if this entry is fresh (age below the TTL)
    pub fn is_fresh(&self) -> bool {
        self.age() < self.ttl
    }

    pub fn is_expired(&self) -> bool {
        !self.is_fresh()
    }

    fn mark_accessed(&mut self) {
        self.access_count += 1;
        self.last_accessed = Instant::now();
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
}

/// Key/value cache with per-entry TTL and LRU eviction at capacity
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    counters: RwLock<Counters>,
    config: CacheConfig,
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            counters: RwLock::new(Counters::default()),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get a value if present and fresh; expired entries are removed
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.write();
        let hit = match entries.get_mut(key) {
            Some(entry) if entry.is_fresh() => {
                entry.mark_accessed();
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                log::debug!("Cache entry expired: {:?}", key);
                None
            }
            None => None,
        };
        drop(entries);

        let mut counters = self.counters.write();
        if hit.is_some() {
            counters.hits += 1;
        } else {
            counters.misses += 1;
        }
        hit
    }

    /// Store a value with the default TTL
    pub fn put(&self, key: K, value: V) {
        self.put_with_ttl(key, value, self.config.default_ttl);
    }

    /// Store a value with an explicit TTL. A zero TTL stores nothing.
    pub fn put_with_ttl(&self, key: K, value: V, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }

        let mut entries = self.entries.write();
        entries.remove(&key);

        while entries.len() >= self.config.max_entries && !entries.is_empty() {
            let lru_key = entries
                .iter()
                .min_by_key(|(_, entry)| (entry.last_accessed, entry.access_count))
                .map(|(key, _)| key.clone());

            match lru_key {
                Some(key) => {
                    entries.remove(&key);
                    log::debug!("Evicted cache entry: {:?}", key);
                }
                None => break,
            }
        }

        entries.insert(key, CacheEntry::new(value, ttl));
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.write().remove(key).map(|e| e.value)
    }

    /// Clear the entire cache
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Remove expired entries, returning how many were dropped
    pub fn cleanup_expired(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh());
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read();
        let counters = self.counters.read();
        CacheStats {
            entry_count: entries.len(),
            expired_entries: entries.values().filter(|e| e.is_expired()).count(),
            max_entries: self.config.max_entries,
            hits: counters.hits,
            misses: counters.misses,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    /// Number of entries in the cache
    pub entry_count: usize,
    /// Number of expired entries
    pub expired_entries: usize,
    /// Maximum allowed number of entries
    pub max_entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Fraction of lookups served from the cache
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Get entry utilization as a percentage
    pub fn entry_utilization(&self) -> f64 {
        if self.max_entries == 0 {
            0.0
        } else {
            (self.entry_count as f64 / self.max_entries as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_fresh_until_ttl() {
        let cache: TtlCache<String, u32> = TtlCache::default();
        cache.put("api-content".to_string(), 7);

        tokio::time::advance(Duration::from_millis(299_999)).await;
        assert_eq!(cache.get(&"api-content".to_string()), Some(7));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get(&"api-content".to_string()), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_put_replaces_value() {
        let cache: TtlCache<&str, &str> = TtlCache::default();
        cache.put("k", "a");
        cache.put("k", "b");
        assert_eq!(cache.get(&"k"), Some("b"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_zero_ttl_is_not_stored() {
        let cache: TtlCache<&str, u8> = TtlCache::default();
        cache.put_with_ttl("k", 1, Duration::ZERO);
        assert!(cache.get(&"k").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lru_eviction() {
        let cache: TtlCache<&str, u8> = TtlCache::new(CacheConfig {
            max_entries: 2,
            ..Default::default()
        });

        cache.put("a", 1);
        tokio::time::advance(Duration::from_millis(10)).await;
        cache.put("b", 2);
        tokio::time::advance(Duration::from_millis(10)).await;
        assert!(cache.get(&"a").is_some());
        tokio::time::advance(Duration::from_millis(10)).await;
        cache.put("c", 3);

        assert!(cache.get(&"a").is_some());
        assert!(cache.get(&"b").is_none());
        assert!(cache.get(&"c").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_and_stats() {
        let cache: TtlCache<&str, u8> = TtlCache::default();
        cache.put_with_ttl("short", 1, Duration::from_secs(1));
        cache.put("long", 2);
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(cache.stats().expired_entries, 1);
        assert_eq!(cache.cleanup_expired(), 1);

        cache.get(&"long");
        cache.get(&"missing");
        let stats = cache.stats();
        assert_eq!(stats.entry_count, 1);
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert!((stats.hit_ratio() - 0.5).abs() < f64::EPSILON);
    }
}
