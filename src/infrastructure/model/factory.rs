//! Model factory - selects an inference model by name

use std::sync::Arc;
use std::time::Duration;

use crate::domain::model::{InferenceModel, ModelFamily, ModelKind};
use crate::domain::recommend::InferenceRequest;
use crate::domain::service::ServiceConfig;
use crate::domain::DomainError;
use crate::infrastructure::feature::SampleRegistry;

use super::{ModelBinding, RankingModel, RetrievalModel};

/// Builds a fresh model per request
#[derive(Debug, Clone)]
pub struct ModelFactory {
    samples: SampleRegistry,
    call_timeout: Duration,
}

impl ModelFactory {
    pub fn new(samples: SampleRegistry, call_timeout: Duration) -> Self {
        Self {
            samples,
            call_timeout,
        }
    }

    /// Resolves a model name, falling back to the service default when blank
    pub fn resolve(model_name: &str, service: &ServiceConfig) -> Result<ModelKind, DomainError> {
        let name = if model_name.trim().is_empty() {
            service.model().default_model_type.as_str()
        } else {
            model_name
        };

        name.parse()
    }

    /// Binds the named model to `request` and `service`
    ///
    /// Fails with a configuration error for unknown names; no backend call is
    /// made in that case.
    pub fn create(
        &self,
        model_name: &str,
        request: InferenceRequest,
        service: Arc<ServiceConfig>,
    ) -> Result<Box<dyn InferenceModel>, DomainError> {
        let kind = Self::resolve(model_name, &service)?;
        let samples = self.samples.get(request.sample_kind())?;

        let binding = ModelBinding::new(kind, request, service, samples, self.call_timeout);

        Ok(match kind.family() {
            ModelFamily::Ranking => Box::new(RankingModel::new(binding)),
            ModelFamily::Retrieval => Box::new(RetrievalModel::new(binding)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::MockCache;
    use crate::domain::recommend::ServiceId;
    use crate::domain::service::ModelConfig;
    use crate::infrastructure::cache::FeatureCache;
    use crate::infrastructure::feature::SampleAssembler;

    fn factory() -> ModelFactory {
        let assembler = SampleAssembler::new(
            FeatureCache::new(Arc::new(MockCache::new()), 0),
            Arc::default(),
        );
        ModelFactory::new(SampleRegistry::standard(assembler), Duration::from_millis(100))
    }

    fn request() -> InferenceRequest {
        InferenceRequest::new(ServiceId::new("rec-home", "default", "test"), "u1")
    }

    #[test]
    fn test_create_known_models() {
        let service = Arc::new(ServiceConfig::for_tests("rec-home"));

        for kind in ModelKind::ALL {
            let model = factory()
                .create(&kind.as_str().to_uppercase(), request(), service.clone())
                .unwrap();
            assert_eq!(model.name(), kind.as_str());
        }
    }

    #[test]
    fn test_blank_name_uses_service_default() {
        let service = ServiceConfig::for_tests("rec-home").with_model(ModelConfig {
            default_model_type: "youtube_dnn".to_string(),
            ..Default::default()
        });

        let model = factory().create("", request(), Arc::new(service)).unwrap();

        assert_eq!(model.name(), "youtube_dnn");
    }

    #[test]
    fn test_unknown_model_is_configuration_error() {
        let service = Arc::new(ServiceConfig::for_tests("rec-home"));

        let err = factory().create("xgboost", request(), service).unwrap_err();

        assert!(err.is_configuration());
    }
}
