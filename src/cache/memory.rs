//! In-memory cache implementation using moka
//!
//! Values are stored as JSON so any serializable type fits. Each entry
//! carries its own deadline on top of the cache-wide time-to-live.

use super::CacheLayer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use moka::future::Cache;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEFAULT_MAX_CAPACITY: u64 = 10_000;

const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Clone)]
struct CacheEntry {
    data: Arc<String>,
    expires_at: Instant,
}

impl CacheEntry {
    fn new<T: Serialize>(value: &T, ttl: Duration) -> Result<Self> {
        let json = serde_json::to_string(value).context("Failed to serialize cache value")?;
        Ok(Self {
            data: Arc::new(json),
            expires_at: Instant::now() + ttl,
        })
    }

    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }

    fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.data).context("Failed to deserialize cache value")
    }
}

pub struct MemoryCache {
    cache: Cache<String, CacheEntry>,
    default_ttl: Duration,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entry_count", &self.cache.entry_count())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_capacity_and_ttl(DEFAULT_MAX_CAPACITY, DEFAULT_TTL)
    }

    /// Create a memory cache with custom capacity and default TTL
    ///
    /// # Arguments
    /// * `max_capacity` - Maximum number of entries the cache can hold
    /// * `default_ttl` - Upper bound for every entry's lifetime; moka drops
    ///   entries older than this even when `set` asked for longer
    pub fn with_capacity_and_ttl(max_capacity: u64, default_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(default_ttl)
            .build();

        Self { cache, default_ttl }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Glob match used by `delete_pattern`.
    ///
    /// # Arguments
    /// * `pattern` - `*` matches any run of characters, `?` exactly one
    /// * `key` - The cache key to test
    ///
    /// # Returns
    /// `true` if the whole key matches the whole pattern
    fn pattern_matches(pattern: &str, key: &str) -> bool {
        let pattern: Vec<char> = pattern.chars().collect();
        let key: Vec<char> = key.chars().collect();

        let (mut p, mut k) = (0, 0);
        let mut backtrack: Option<(usize, usize)> = None;

        while k < key.len() {
            if p < pattern.len() && (pattern[p] == '?' || pattern[p] == key[k]) {
                p += 1;
                k += 1;
            } else if p < pattern.len() && pattern[p] == '*' {
                backtrack = Some((p, k));
                p += 1;
            } else if let Some((star, matched)) = backtrack {
                p = star + 1;
                k = matched + 1;
                backtrack = Some((star, k));
            } else {
                return false;
            }
        }

        pattern[p..].iter().all(|c| *c == '*')
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheLayer for MemoryCache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self.cache.get(key).await {
            Some(entry) if entry.is_live() => Ok(Some(entry.deserialize()?)),
            Some(_) => {
                self.cache.invalidate(key).await;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Store a value, overwriting any existing entry for `key`.
    ///
    /// # Arguments
    /// * `key` - The cache key
    /// * `value` - Any serializable value; stored as JSON
    /// * `ttl` - Lifetime of this entry, capped at the cache's default TTL
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let entry = CacheEntry::new(value, ttl.min(self.default_ttl))?;
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        let keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| Self::pattern_matches(pattern, key.as_ref()))
            .map(|(key, _)| (*key).clone())
            .collect();

        for key in keys {
            self.cache.invalidate(&key).await;
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = MemoryCache::new();
        cache.set("entries:approved", &vec![1, 2, 3], Duration::from_secs(60)).await.unwrap();

        let result: Option<Vec<i32>> = cache.get("entries:approved").await.unwrap();
        assert_eq!(result, Some(vec![1, 2, 3]));
        let missing: Option<String> = cache.get("entries:other").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_per_entry_ttl() {
        let cache = MemoryCache::new();
        cache.set("short", &"v", Duration::from_millis(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let result: Option<String> = cache.get("short").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_delete_pattern() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.set("entries:approved", &1, ttl).await.unwrap();
        cache.set("entries:42", &2, ttl).await.unwrap();
        cache.set("tours:1", &3, ttl).await.unwrap();

        cache.delete_pattern("entries:*").await.unwrap();

        assert!(cache.get::<i32>("entries:approved").await.unwrap().is_none());
        assert!(cache.get::<i32>("entries:42").await.unwrap().is_none());
        assert_eq!(cache.get::<i32>("tours:1").await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.set("a", &1, ttl).await.unwrap();
        cache.set("b", &2, ttl).await.unwrap();

        cache.delete("a").await.unwrap();
        assert!(cache.get::<i32>("a").await.unwrap().is_none());

        cache.clear().await.unwrap();
        assert!(cache.get::<i32>("b").await.unwrap().is_none());
    }

    #[test]
    fn test_pattern_matches() {
        assert!(MemoryCache::pattern_matches("entries:*", "entries:approved"));
        assert!(MemoryCache::pattern_matches("entries:*", "entries:"));
        assert!(MemoryCache::pattern_matches("user:?:fav", "user:1:fav"));
        assert!(MemoryCache::pattern_matches("*:approved", "entries:approved"));
        assert!(MemoryCache::pattern_matches("a*b*c", "axxbyyc"));
        assert!(!MemoryCache::pattern_matches("entries:*", "tours:1"));
        assert!(!MemoryCache::pattern_matches("user:?:fav", "user:12:fav"));
        assert!(!MemoryCache::pattern_matches("exact", "exactx"));
    }

    proptest! {
        #[test]
        fn prefix_star_matches_any_suffix(prefix in "[a-z:]{0,8}", suffix in "[a-z0-9:]{0,12}") {
            let pattern = format!("{}*", prefix);
            let key = format!("{}{}", prefix, suffix);
            prop_assert!(MemoryCache::pattern_matches(&pattern, &key));
        }

        #[test]
        fn literal_pattern_matches_only_itself(a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
            prop_assert_eq!(MemoryCache::pattern_matches(&a, &b), a == b);
        }
    }
}
