//! Process-local feature store, used for local runs and seeded fixtures

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::feature::FeatureStore;
use crate::domain::filter::IdSource;
use crate::domain::DomainError;

#[derive(Debug, Default)]
pub struct InMemoryFeatureStore {
    features: RwLock<HashMap<String, Bytes>>,
    id_sets: RwLock<HashMap<String, Vec<String>>>,
}

impl InMemoryFeatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, payload: impl Into<Bytes>) {
        self.features
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), payload.into());
    }

    /// Replaces the id set stored under `key`
    pub fn set_ids<I, S>(&self, key: impl Into<String>, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.id_sets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), ids.into_iter().map(Into::into).collect());
    }
}

#[async_trait]
impl FeatureStore for InMemoryFeatureStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, DomainError> {
        let features = self.features.read().unwrap_or_else(PoisonError::into_inner);
        Ok(features.get(key).cloned())
    }
}

#[async_trait]
impl IdSource for InMemoryFeatureStore {
    async fn load_ids(&self, key: &str) -> Result<Vec<String>, DomainError> {
        let id_sets = self.id_sets.read().unwrap_or_else(PoisonError::into_inner);
        Ok(id_sets.get(key).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_and_load_ids() {
        let store = InMemoryFeatureStore::new();
        store.insert("user:u1", vec![1u8, 2]);
        store.set_ids("users", ["u1", "u2"]);

        assert_eq!(store.get("user:u1").await.unwrap().unwrap().as_ref(), &[1u8, 2]);
        assert!(store.get("user:u2").await.unwrap().is_none());
        assert_eq!(store.load_ids("users").await.unwrap(), vec!["u1", "u2"]);
        assert!(store.load_ids("items").await.unwrap().is_empty());
    }
}
