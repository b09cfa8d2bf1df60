//! Process-shared LRU cache for embedding vectors

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::Serialize;
use tracing::debug;

use crate::errors::Result;
use crate::fingerprint::text_digest;

/// Cache limits and aging behavior
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of resident entries
    pub max_entries: usize,
    /// Upper bound on accounted vector bytes (`len * 8` per entry)
    pub max_memory_bytes: usize,
    /// Entries older than this are treated as absent
    pub ttl_ms: u64,
    /// Whether a hit resets the entry's age and recency
    pub update_age_on_get: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            max_memory_bytes: 500 * 1024 * 1024,
            ttl_ms: 24 * 60 * 60 * 1000,
            update_age_on_get: true,
        }
    }
}

/// Counters reported by [`EmbeddingCache::stats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Resident entry count
    pub size: usize,
    /// Accounted bytes across resident vectors
    pub calculated_bytes: usize,
}

struct CacheEntry {
    vector: Vec<f32>,
    stored_at: Instant,
}

impl CacheEntry {
    fn byte_size(&self) -> usize {
        self.vector.len() * 8
    }
}

struct CacheInner {
    entries: LruCache<String, CacheEntry>,
    bytes: usize,
    hits: u64,
    misses: u64,
}

enum Lookup {
    Fresh(Vec<f32>),
    Expired,
    Absent,
}

/// LRU + TTL + memory-bound cache keyed by SHA-256 of the exact input text
///
/// Held behind an `Arc` by the embedding service; tests substitute their
/// own instance instead of touching a process global.
pub struct EmbeddingCache {
    config: CacheConfig,
    inner: Mutex<CacheInner>,
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl EmbeddingCache {
    pub fn new(config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries.max(1)).expect("max(1) is non-zero");
        Self {
            config,
            inner: Mutex::new(CacheInner {
                entries: LruCache::new(capacity),
                bytes: 0,
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// Cached vector for `text`, if present and fresh
    pub fn get(&self, text: &str) -> Option<Vec<f32>> {
        let key = text_digest(text);
        let ttl = Duration::from_millis(self.config.ttl_ms);
        let mut inner = self.inner.lock().expect("cache mutex poisoned");

        let lookup = {
            // `get_mut` refreshes recency, `peek_mut` leaves it alone
            let entry = if self.config.update_age_on_get {
                inner.entries.get_mut(&key)
            } else {
                inner.entries.peek_mut(&key)
            };
            match entry {
                None => Lookup::Absent,
                Some(entry) if entry.stored_at.elapsed() > ttl => Lookup::Expired,
                Some(entry) => {
                    if self.config.update_age_on_get {
                        entry.stored_at = Instant::now();
                    }
                    Lookup::Fresh(entry.vector.clone())
                }
            }
        };

        match lookup {
            Lookup::Fresh(vector) => {
                inner.hits += 1;
                Some(vector)
            }
            Lookup::Expired => {
                // Drop the entry so it stops occupying budget
                if let Some(dead) = inner.entries.pop(&key) {
                    inner.bytes -= dead.byte_size();
                }
                inner.misses += 1;
                None
            }
            Lookup::Absent => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Store a vector for `text`, evicting as needed to stay within bounds
    pub fn set(&self, text: &str, vector: Vec<f32>) {
        let key = text_digest(text);
        let entry = CacheEntry { vector, stored_at: Instant::now() };
        let added = entry.byte_size();

        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        if let Some((_, evicted)) = inner.entries.push(key, entry) {
            inner.bytes -= evicted.byte_size();
        }
        inner.bytes += added;

        while inner.bytes > self.config.max_memory_bytes {
            match inner.entries.pop_lru() {
                Some((_, evicted)) => inner.bytes -= evicted.byte_size(),
                None => break,
            }
        }
    }

    /// Return the cached vector or compute, store, and return it
    ///
    /// Exactly one `produce` call happens per key under sequential use;
    /// concurrent misses may produce duplicates, of which one wins.
    pub async fn get_or_embed<F, Fut>(&self, text: &str, produce: F) -> Result<Vec<f32>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Vec<f32>>>,
    {
        if let Some(vector) = self.get(text) {
            return Ok(vector);
        }
        let vector = produce().await?;
        self.set(text, vector.clone());
        Ok(vector)
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        inner.entries.clear();
        inner.bytes = 0;
        inner.hits = 0;
        inner.misses = 0;
        debug!("embedding cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().expect("cache mutex poisoned");
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            size: inner.entries.len(),
            calculated_bytes: inner.bytes,
        }
    }

    /// Fraction of lookups answered from the cache; 0.0 when unused
    pub fn hit_rate(&self) -> f64 {
        let stats = self.stats();
        let total = stats.hits + stats.misses;
        if total == 0 {
            0.0
        } else {
            stats.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn small_cache(max_entries: usize) -> EmbeddingCache {
        EmbeddingCache::new(CacheConfig { max_entries, ..CacheConfig::default() })
    }

    #[test]
    fn test_miss_then_hit_updates_stats() {
        let fixture = small_cache(8);

        assert_eq!(fixture.get("abc"), None);
        fixture.set("abc", vec![1.0, 2.0]);
        assert_eq!(fixture.get("abc"), Some(vec![1.0, 2.0]));

        let actual = fixture.stats();
        let expected = CacheStats { hits: 1, misses: 1, size: 1, calculated_bytes: 16 };

        assert_eq!(actual, expected);
        assert_eq!(fixture.hit_rate(), 0.5);
    }

    #[test]
    fn test_entry_count_eviction_is_lru() {
        let fixture = small_cache(2);
        fixture.set("a", vec![0.0]);
        fixture.set("b", vec![0.0]);

        // Touch "a" so "b" becomes least recently used
        assert!(fixture.get("a").is_some());
        fixture.set("c", vec![0.0]);

        assert!(fixture.get("a").is_some());
        assert_eq!(fixture.get("b"), None);
        assert!(fixture.get("c").is_some());
        assert_eq!(fixture.stats().size, 2);
    }

    #[test]
    fn test_memory_bound_eviction() {
        let fixture = EmbeddingCache::new(CacheConfig {
            max_entries: 100,
            max_memory_bytes: 40,
            ..CacheConfig::default()
        });

        fixture.set("a", vec![0.0; 4]); // 32 bytes
        fixture.set("b", vec![0.0; 4]); // 32 bytes, evicts "a"

        assert_eq!(fixture.get("a"), None);
        assert!(fixture.get("b").is_some());
        assert_eq!(fixture.stats().calculated_bytes, 32);
    }

    #[test]
    fn test_ttl_expiry_counts_as_miss() {
        let fixture = EmbeddingCache::new(CacheConfig { ttl_ms: 0, ..CacheConfig::default() });
        fixture.set("a", vec![1.0]);
        std::thread::sleep(Duration::from_millis(2));

        assert_eq!(fixture.get("a"), None);

        let stats = fixture.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 0);
        assert_eq!(stats.calculated_bytes, 0);
    }

    #[test]
    fn test_clear_resets_everything() {
        let fixture = small_cache(8);
        fixture.set("a", vec![1.0]);
        fixture.get("a");
        fixture.clear();

        let actual = fixture.stats();
        let expected = CacheStats::default();

        assert_eq!(actual, expected);
        assert_eq!(fixture.hit_rate(), 0.0);
    }

    #[tokio::test]
    async fn test_get_or_embed_invokes_produce_once() {
        let fixture = small_cache(8);
        let mut calls = 0;

        let first = fixture
            .get_or_embed("abc", || {
                calls += 1;
                async { Ok(vec![0.5; 3]) }
            })
            .await
            .unwrap();
        let second = fixture
            .get_or_embed("abc", || {
                calls += 1;
                async { Ok(vec![0.5; 3]) }
            })
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(calls, 1);
    }
}
