//! Feature store contract

use std::fmt::Debug;

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::DomainError;

/// Key-value store holding offline features per entity
#[async_trait]
pub trait FeatureStore: Send + Sync + Debug {
    /// Reads the serialized features stored under `key`
    async fn get(&self, key: &str) -> Result<Option<Bytes>, DomainError>;
}
