//! Redis-backed feature store and id source

use async_trait::async_trait;
use bytes::Bytes;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::domain::feature::FeatureStore;
use crate::domain::filter::IdSource;
use crate::domain::DomainError;

/// Reads serialized features with `GET` and id sets with `SMEMBERS`
#[derive(Clone)]
pub struct RedisFeatureStore {
    conn: ConnectionManager,
    url: String,
}

impl std::fmt::Debug for RedisFeatureStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisFeatureStore")
            .field("url", &self.url)
            .finish()
    }
}

impl RedisFeatureStore {
    pub async fn connect(url: impl Into<String>) -> Result<Self, DomainError> {
        let url = url.into();

        let client = redis::Client::open(url.as_str())
            .map_err(|e| DomainError::configuration(format!("Invalid Redis URL: {}", e)))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| DomainError::store(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self { conn, url })
    }
}

#[async_trait]
impl FeatureStore for RedisFeatureStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, DomainError> {
        let mut conn = self.conn.clone();

        let value: Option<Vec<u8>> = conn
            .get(key)
            .await
            .map_err(|e| DomainError::store(format!("Redis GET '{}' failed: {}", key, e)))?;

        Ok(value.map(Bytes::from))
    }
}

#[async_trait]
impl IdSource for RedisFeatureStore {
    async fn load_ids(&self, key: &str) -> Result<Vec<String>, DomainError> {
        let mut conn = self.conn.clone();

        conn.smembers(key)
            .await
            .map_err(|e| DomainError::store(format!("Redis SMEMBERS '{}' failed: {}", key, e)))
    }
}
