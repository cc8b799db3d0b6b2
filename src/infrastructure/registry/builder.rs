//! Builds service handles from configuration

use std::sync::Arc;

use tracing::info;

use crate::config::{BackendSettings, ServiceSettings};
use crate::domain::backend::{ConnectionPool, PoolConfig};
use crate::domain::feature::FeatureStore;
use crate::domain::filter::IdSource;
use crate::domain::recommend::ServiceId;
use crate::domain::service::{ModelConfig, ServiceConfig};
use crate::domain::DomainError;
use crate::infrastructure::backend::HttpConnectionManager;
use crate::infrastructure::feature::{InMemoryFeatureStore, RedisFeatureStore};

#[derive(Debug, Clone)]
pub struct ServiceBuilder {
    backend: BackendSettings,
}

impl ServiceBuilder {
    pub fn new(backend: BackendSettings) -> Self {
        Self { backend }
    }

    pub fn model_config(&self, settings: &ServiceSettings) -> ModelConfig {
        ModelConfig {
            model_name: settings.model_name.clone(),
            default_model_type: settings.default_model_type.to_lowercase(),
            model_version: settings.model_version.or(self.backend.model_version),
            user_key_prefix: settings.user_key_prefix.clone(),
            item_key_prefix: settings.item_key_prefix.clone(),
            user_ids_key: settings.user_ids_key.clone(),
            item_ids_key: settings.item_ids_key.clone(),
        }
    }

    pub fn pool(&self, endpoint: &str) -> Result<ConnectionPool, DomainError> {
        let manager = HttpConnectionManager::new(endpoint, self.backend.call_timeout())?;

        Ok(ConnectionPool::new(
            Arc::new(manager),
            PoolConfig {
                max_size: self.backend.pool_size,
                acquire_timeout: self.backend.acquire_timeout(),
            },
        ))
    }

    pub async fn build(&self, settings: &ServiceSettings) -> Result<ServiceConfig, DomainError> {
        let id = ServiceId::new(&settings.data_id, &settings.group_id, &settings.namespace);

        let (feature_store, id_source): (Arc<dyn FeatureStore>, Arc<dyn IdSource>) =
            match &settings.redis_url {
                Some(url) => {
                    let store = Arc::new(RedisFeatureStore::connect(url.as_str()).await?);
                    (store.clone() as Arc<dyn FeatureStore>, store as Arc<dyn IdSource>)
                }
                None => {
                    let store = Arc::new(InMemoryFeatureStore::new());
                    (store.clone() as Arc<dyn FeatureStore>, store as Arc<dyn IdSource>)
                }
            };

        let pool = self.pool(&settings.endpoint)?;

        info!(
            service = %id,
            model = %settings.model_name,
            endpoint = %settings.endpoint,
            "Service configured"
        );

        Ok(ServiceConfig::new(
            id,
            self.model_config(settings),
            feature_store,
            id_source,
            pool,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ServiceSettings {
        serde_json::from_value(serde_json::json!({
            "data_id": "rec-home",
            "model_name": "rank",
            "default_model_type": "DeepFM",
            "endpoint": "http://tf:8501"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_build_without_redis_uses_in_memory_store() {
        let builder = ServiceBuilder::new(BackendSettings {
            model_version: Some(7),
            ..Default::default()
        });

        let service = builder.build(&settings()).await.unwrap();

        assert_eq!(service.service_id(), "rec-home");
        assert_eq!(service.model().default_model_type, "deepfm");
        assert_eq!(service.model().model_version, Some(7));
        assert!(service.feature_store().get("user:u1").await.unwrap().is_none());
    }

    #[test]
    fn test_service_version_overrides_backend_default() {
        let mut settings = settings();
        settings.model_version = Some(3);
        let builder = ServiceBuilder::new(BackendSettings {
            model_version: Some(7),
            ..Default::default()
        });

        assert_eq!(builder.model_config(&settings).model_version, Some(3));
    }
}
