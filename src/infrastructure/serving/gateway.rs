//! Request gateway - one deadline-bounded round trip per request

use std::collections::HashMap;
use std::fmt;
use std::future::{pending, Future};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::OnceCell;
use tokio::time::sleep;
use tracing::{error, info, warn};

use super::Dispatcher;
use crate::domain::recommend::{InferenceRequest, RecommendResponse};
use crate::domain::service::{ListenerConn, ServiceRegistry};
use crate::domain::DomainError;
use crate::infrastructure::observability::record_recommend_request;

/// The gateway gave up waiting for a request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("Request deadline of {timeout_ms}ms exceeded")]
    DeadlineExceeded { timeout_ms: u64 },

    #[error("Request cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    /// Wall-clock budget of a whole request
    pub request_timeout: Duration,
    /// Configuration server used for listener subscriptions
    pub config_host: String,
    pub config_port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(150),
            config_host: "127.0.0.1".to_string(),
            config_port: 8848,
        }
    }
}

struct Shared {
    config: GatewayConfig,
    registry: Arc<dyn ServiceRegistry>,
    dispatcher: Arc<Dispatcher>,
    // One subscription per data-id; a failed attempt leaves the cell empty
    listeners: Mutex<HashMap<String, Arc<OnceCell<()>>>>,
}

/// Entry point of the request pipeline
#[derive(Clone)]
pub struct Gateway {
    shared: Arc<Shared>,
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("config", &self.shared.config)
            .field("dispatcher", &self.shared.dispatcher)
            .finish()
    }
}

impl Gateway {
    pub fn new(
        config: GatewayConfig,
        registry: Arc<dyn ServiceRegistry>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                registry,
                dispatcher,
                listeners: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.shared.config
    }

    pub async fn recommend(&self, request: InferenceRequest) -> Result<RecommendResponse, GatewayError> {
        self.recommend_with_cancel(request, pending()).await
    }

    /// Serves `request`, giving up at the deadline or when `cancel` resolves
    ///
    /// The request runs as its own task. Giving up stops the waiting only:
    /// the task keeps running until its backend calls finish or time out.
    /// Callers answer a [`GatewayError`] with [`RecommendResponse::default`].
    pub async fn recommend_with_cancel<C>(
        &self,
        request: InferenceRequest,
        cancel: C,
    ) -> Result<RecommendResponse, GatewayError>
    where
        C: Future<Output = ()>,
    {
        let started = Instant::now();
        let data_id = request.service().data_id.clone();
        let deadline = self.shared.config.request_timeout;

        let shared = self.shared.clone();
        let unit = tokio::spawn(async move { shared.execute(request).await });

        let outcome = tokio::select! {
            joined = unit => Ok(joined.unwrap_or_else(|e| {
                error!(data_id = %data_id, error = %e, "Request task failed");
                RecommendResponse::failure(&DomainError::internal(format!("Request task failed: {}", e)))
            })),
            _ = sleep(deadline) => Err(GatewayError::DeadlineExceeded {
                timeout_ms: deadline.as_millis() as u64,
            }),
            _ = cancel => Err(GatewayError::Cancelled),
        };

        let label = match &outcome {
            Ok(response) if response.is_success() => "success",
            Ok(_) => "failure",
            Err(GatewayError::DeadlineExceeded { .. }) => "deadline",
            Err(GatewayError::Cancelled) => "cancelled",
        };

        if let Err(e) = &outcome {
            warn!(data_id = %data_id, elapsed_ms = started.elapsed().as_millis() as u64, "{}", e);
        }

        record_recommend_request(&data_id, label, started.elapsed());
        outcome
    }
}

impl Shared {
    async fn execute(&self, request: InferenceRequest) -> RecommendResponse {
        let data_id = request.service().data_id.clone();

        match self.run(request).await {
            Ok(response) => response,
            Err(e) => {
                if e.is_configuration() {
                    warn!(data_id = %data_id, error = %e, "Request rejected");
                } else {
                    error!(data_id = %data_id, error = %e, "Request failed");
                }
                RecommendResponse::failure(&e)
            }
        }
    }

    async fn run(&self, request: InferenceRequest) -> Result<RecommendResponse, DomainError> {
        self.ensure_listening(&request).await?;

        let data_id = &request.service().data_id;
        let service = self.registry.lookup(data_id).ok_or_else(|| {
            DomainError::not_found(format!("No configuration for service '{}'", data_id))
        })?;

        let items = self.dispatcher.dispatch(request, service).await?;

        Ok(RecommendResponse::success(items))
    }

    /// Subscribes to the service's configuration the first time it is seen
    async fn ensure_listening(&self, request: &InferenceRequest) -> Result<(), DomainError> {
        let id = request.service();

        let cell = {
            let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
            listeners.entry(id.data_id.clone()).or_default().clone()
        };

        cell.get_or_try_init(|| async {
            let conn = ListenerConn {
                service: id.clone(),
                host: self.config.config_host.clone(),
                port: self.config.config_port,
            };

            self.registry.ensure_listening(&conn).await.map_err(|e| {
                DomainError::configuration(format!("Failed to subscribe to '{}': {}", id, e))
            })?;

            info!(service = %id, "Listening for configuration changes");
            Ok::<(), DomainError>(())
        })
        .await
        .map(|_| ())
    }
}
