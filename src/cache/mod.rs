//! Cache layer
//!
//! An in-process moka cache in front of the read-heavy archive listing.
//! Keys are namespaced (`entries:approved`) so writers can drop a whole
//! family with [`CacheLayer::delete_pattern`].

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

pub use memory::MemoryCache;

/// Cache operations.
///
/// The methods are generic, so the trait is not object safe; services hold
/// a concrete `Arc<MemoryCache>`.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete all keys matching a glob pattern
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// Build the shared cache from configuration
pub fn create_cache(config: &CacheConfig) -> Arc<MemoryCache> {
    Arc::new(MemoryCache::with_capacity_and_ttl(
        config.max_capacity,
        Duration::from_secs(config.ttl_seconds),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_cache_uses_config_ttl() {
        let config = CacheConfig {
            ttl_seconds: 30,
            max_capacity: 100,
        };
        let cache = create_cache(&config);
        assert_eq!(cache.default_ttl(), Duration::from_secs(30));

        cache.set("k", &"v".to_string(), Duration::from_secs(60)).await.unwrap();
        let value: Option<String> = cache.get("k").await.unwrap();
        assert_eq!(value.as_deref(), Some("v"));
    }
}
