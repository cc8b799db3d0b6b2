//! State shared by every model variant: what to score and how to reach the backend

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::histogram;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::domain::backend::{PredictRequest, PredictResponse, Tensor};
use crate::domain::feature::{ExampleFeatures, SampleContext, SampleStrategy};
use crate::domain::model::{ModelKind, INPUT_ITEMS, INPUT_USER, INPUT_USER_CONTEXT};
use crate::domain::recommend::InferenceRequest;
use crate::domain::service::ServiceConfig;
use crate::domain::DomainError;

/// A model kind bound to one request and one service
#[derive(Debug, Clone)]
pub struct ModelBinding {
    kind: ModelKind,
    request: InferenceRequest,
    service: Arc<ServiceConfig>,
    samples: Arc<dyn SampleStrategy>,
    call_timeout: Duration,
}

impl ModelBinding {
    pub fn new(
        kind: ModelKind,
        request: InferenceRequest,
        service: Arc<ServiceConfig>,
        samples: Arc<dyn SampleStrategy>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            kind,
            request,
            service,
            samples,
            call_timeout,
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn request(&self) -> &InferenceRequest {
        &self.request
    }

    pub fn service(&self) -> &ServiceConfig {
        &self.service
    }

    pub async fn assemble(&self) -> Result<ExampleFeatures, DomainError> {
        self.samples
            .assemble(SampleContext {
                request: &self.request,
                service: &self.service,
                model_name: self.kind.as_str(),
            })
            .await
    }

    /// Prediction request carrying one string tensor per feature group
    pub fn predict_request(&self, features: &ExampleFeatures, outputs: &[&str]) -> PredictRequest {
        let model = self.service.model();

        let items = features
            .items()
            .iter()
            .map(|record| record.payload().clone())
            .collect();

        let request = PredictRequest::new(model.model_name.clone())
            .with_version(model.model_version)
            .with_input(INPUT_USER, Tensor::strings(vec![features.user().payload().clone()]))
            .with_input(
                INPUT_USER_CONTEXT,
                Tensor::strings(vec![features.user_context().payload().clone()]),
            )
            .with_input(INPUT_ITEMS, Tensor::strings(items));

        outputs
            .iter()
            .fold(request, |request, output| request.with_output(*output))
    }

    /// Calls the backend on a pooled connection under the per-call timeout
    ///
    /// The connection goes back to the pool when this returns or is dropped;
    /// connections that failed or timed out are discarded instead.
    pub async fn predict(&self, request: &PredictRequest) -> Result<PredictResponse, DomainError> {
        let started = Instant::now();
        let mut conn = self.service.pool().acquire().await?;

        let result = match timeout(self.call_timeout, conn.predict(request)).await {
            Ok(result) => result,
            Err(_) => Err(DomainError::timeout(self.call_timeout.as_millis() as u64)),
        };

        histogram!("backend_call_duration_seconds", "model" => self.kind.as_str())
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(mut response) => {
                response.retain_outputs(&request.output_filter);
                debug!(model = %self.kind, outputs = response.outputs.len(), "Backend call succeeded");
                Ok(response)
            }
            Err(e) => {
                warn!(model = %self.kind, error = %e, "Backend call failed");
                conn.mark_broken();
                Err(e)
            }
        }
    }
}
