//! Redis-backed cache shared between gateway instances

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use crate::domain::cache::Cache;
use crate::domain::DomainError;

#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    pub url: String,
    /// Namespace joined to every key as `prefix:key`
    pub key_prefix: Option<String>,
}

#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    key_prefix: Option<String>,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}

impl RedisCache {
    pub async fn connect(config: RedisCacheConfig) -> Result<Self, DomainError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| DomainError::configuration(format!("Invalid Redis URL: {}", e)))?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self {
            connection,
            key_prefix: config.key_prefix,
        })
    }

    fn namespaced(&self, key: &str) -> String {
        namespaced(self.key_prefix.as_deref(), key)
    }
}

fn namespaced(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}:{}", prefix, key),
        None => key.to_string(),
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        let mut conn = self.connection.clone();

        conn.get(self.namespaced(key))
            .await
            .map_err(|e| DomainError::cache(format!("GET '{}' failed: {}", key, e)))
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
        let mut conn = self.connection.clone();
        // SETEX rejects a zero expiry
        let ttl_secs = ttl.as_secs().max(1);

        let _: () = conn
            .set_ex(self.namespaced(key), value, ttl_secs)
            .await
            .map_err(|e| DomainError::cache(format!("SETEX '{}' failed: {}", key, e)))?;

        Ok(())
    }
}
