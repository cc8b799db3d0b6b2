//! Per-service configuration handle

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::backend::ConnectionPool;
use crate::domain::feature::FeatureStore;
use crate::domain::filter::IdSource;
use crate::domain::recommend::ServiceId;

/// Model and key conventions of a service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Name the backend serves the model under
    pub model_name: String,
    /// Model type used when a request carries no hint
    pub default_model_type: String,
    /// Pinned backend model version
    pub model_version: Option<i64>,
    pub user_key_prefix: String,
    pub item_key_prefix: String,
    /// Key listing every known user id (membership filter source)
    pub user_ids_key: String,
    /// Key listing every known item id (membership filter source)
    pub item_ids_key: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_name: "default".to_string(),
            default_model_type: "fm".to_string(),
            model_version: None,
            user_key_prefix: "user:".to_string(),
            item_key_prefix: "item:".to_string(),
            user_ids_key: "users".to_string(),
            item_ids_key: "items".to_string(),
        }
    }
}

/// Configuration of one service, owned by the service registry
///
/// Looked up per request and never mutated by the pipeline; the registry
/// replaces the whole handle when configuration changes.
#[derive(Clone)]
pub struct ServiceConfig {
    id: ServiceId,
    model: ModelConfig,
    feature_store: Arc<dyn FeatureStore>,
    id_source: Arc<dyn IdSource>,
    pool: ConnectionPool,
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("id", &self.id)
            .field("model", &self.model)
            .field("pool", &self.pool)
            .finish()
    }
}

impl ServiceConfig {
    pub fn new(
        id: ServiceId,
        model: ModelConfig,
        feature_store: Arc<dyn FeatureStore>,
        id_source: Arc<dyn IdSource>,
        pool: ConnectionPool,
    ) -> Self {
        Self {
            id,
            model,
            feature_store,
            id_source,
            pool,
        }
    }

    pub fn id(&self) -> &ServiceId {
        &self.id
    }

    /// Stable identity used in cache keys
    pub fn service_id(&self) -> &str {
        &self.id.data_id
    }

    pub fn model(&self) -> &ModelConfig {
        &self.model
    }

    pub fn feature_store(&self) -> &Arc<dyn FeatureStore> {
        &self.feature_store
    }

    pub fn id_source(&self) -> &Arc<dyn IdSource> {
        &self.id_source
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn user_key(&self, user_id: &str) -> String {
        format!("{}{}", self.model.user_key_prefix, user_id)
    }

    pub fn item_key(&self, item_id: &str) -> String {
        format!("{}{}", self.model.item_key_prefix, item_id)
    }
}

#[cfg(test)]
impl ServiceConfig {
    /// Service backed by empty mocks
    pub fn for_tests(data_id: &str) -> Self {
        use crate::domain::backend::{MockBackend, PoolConfig};
        use crate::domain::feature::MockFeatureStore;
        use crate::domain::filter::MockIdSource;

        Self::new(
            ServiceId::new(data_id, "default", "test"),
            ModelConfig::default(),
            Arc::new(MockFeatureStore::new()),
            Arc::new(MockIdSource::new()),
            ConnectionPool::new(Arc::new(MockBackend::new()), PoolConfig::default()),
        )
    }

    pub fn with_feature_store(mut self, store: Arc<dyn FeatureStore>) -> Self {
        self.feature_store = store;
        self
    }

    pub fn with_id_source(mut self, source: Arc<dyn IdSource>) -> Self {
        self.id_source = source;
        self
    }

    pub fn with_pool(mut self, pool: ConnectionPool) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_model(mut self, model: ModelConfig) -> Self {
        self.model = model;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_keys_use_prefixes() {
        let service = ServiceConfig::for_tests("rec-home");
        assert_eq!(service.user_key("u1"), "user:u1");
        assert_eq!(service.item_key("i1"), "item:i1");
        assert_eq!(service.service_id(), "rec-home");
    }
}
