//! Picks the cache backend named in configuration

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use super::in_memory::{InMemoryCache, InMemoryCacheConfig};
use super::redis::{RedisCache, RedisCacheConfig};
use crate::domain::cache::Cache;
use crate::domain::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheType {
    #[default]
    InMemory,
    Redis,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub cache_type: CacheType,
    pub redis_url: Option<String>,
    pub key_prefix: Option<String>,
    /// Entry bound of the in-memory backend
    pub max_capacity: u64,
    /// TTL ceiling of the in-memory backend
    pub max_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_type: CacheType::InMemory,
            redis_url: None,
            key_prefix: None,
            max_capacity: 100_000,
            max_ttl: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Default)]
pub struct CacheFactory;

impl CacheFactory {
    pub fn new() -> Self {
        Self
    }

    pub async fn create(&self, config: &CacheConfig) -> Result<Arc<dyn Cache>, DomainError> {
        match config.cache_type {
            CacheType::InMemory => {
                info!(max_capacity = config.max_capacity, "Using in-memory feature cache");

                Ok(Arc::new(InMemoryCache::new(InMemoryCacheConfig {
                    max_capacity: config.max_capacity,
                    max_ttl: config.max_ttl,
                })))
            }
            CacheType::Redis => {
                let url = config.redis_url.clone().ok_or_else(|| {
                    DomainError::configuration("feature_cache.redis_url is required for the redis backend")
                })?;

                info!("Using Redis feature cache");

                let cache = RedisCache::connect(RedisCacheConfig {
                    url,
                    key_prefix: config.key_prefix.clone(),
                })
                .await?;

                Ok(Arc::new(cache))
            }
        }
    }
}
