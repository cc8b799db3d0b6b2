//! Cache implementations and the feature-bundle cache built on them

mod factory;
mod feature_cache;
mod in_memory;
mod redis;

pub use factory::{CacheConfig, CacheFactory, CacheType};
pub use feature_cache::FeatureCache;
pub use in_memory::{InMemoryCache, InMemoryCacheConfig};
pub use redis::{RedisCache, RedisCacheConfig};
