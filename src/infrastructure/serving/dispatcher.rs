//! Circuit-breaker dispatcher - primary inference with a cheaper fallback

use std::sync::Arc;
use std::time::Instant;

use metrics::counter;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::ResultAggregator;
use crate::domain::model::InferenceModel;
use crate::domain::recommend::{InferenceRequest, RawScoredItem, ScoredItem};
use crate::domain::resilience::CircuitBreakerRegistry;
use crate::domain::service::ServiceConfig;
use crate::domain::DomainError;
use crate::infrastructure::model::ModelFactory;
use crate::infrastructure::observability::{record_inference, InferenceMetricParams};

/// Fallback and circuit settings of the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherConfig {
    /// Name of the circuit guarding the primary path
    pub circuit_name: String,
    /// Model used on the fallback path
    pub fallback_model: String,
    pub lower_recall_num: u32,
    pub lower_rank_num: usize,
    pub tracing_enabled: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            circuit_name: "grpcServer".to_string(),
            fallback_model: "fm".to_string(),
            lower_recall_num: 20,
            lower_rank_num: 50,
            tracing_enabled: false,
        }
    }
}

/// Runs a request through the primary path, or the fallback path when the
/// circuit is open or the primary call fails
#[derive(Debug)]
pub struct Dispatcher {
    config: DispatcherConfig,
    breakers: Arc<CircuitBreakerRegistry>,
    factory: ModelFactory,
    aggregator: ResultAggregator,
}

impl Dispatcher {
    pub fn new(
        config: DispatcherConfig,
        breakers: Arc<CircuitBreakerRegistry>,
        factory: ModelFactory,
        aggregator: ResultAggregator,
    ) -> Self {
        Self {
            config,
            breakers,
            factory,
            aggregator,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Scores `request` and formats the result
    ///
    /// Configuration errors (such as an unknown model) are returned as-is;
    /// they never reach the circuit and never trigger the fallback.
    pub async fn dispatch(
        &self,
        request: InferenceRequest,
        service: Arc<ServiceConfig>,
    ) -> Result<Vec<ScoredItem>, DomainError> {
        let model_name = request.model_type().unwrap_or_default();
        let primary = self
            .factory
            .create(&model_name, request.clone(), service.clone())?;

        let raw = match self.run_primary(primary.as_ref()).await {
            Ok(raw) => raw,
            Err(e) if e.is_configuration() => return Err(e),
            Err(e) => {
                warn!(
                    data_id = %service.service_id(),
                    model = primary.name(),
                    error = %e,
                    "Primary inference unavailable, running fallback"
                );
                self.run_fallback(&request, service).await?
            }
        };

        Ok(self.aggregator.aggregate(raw).await)
    }

    async fn run_primary(
        &self,
        model: &dyn InferenceModel,
    ) -> Result<Vec<RawScoredItem>, DomainError> {
        let breaker = self.breakers.get(&self.config.circuit_name).await;
        let permit = breaker.try_acquire()?;
        let budget = breaker.config().timeout;
        let started = Instant::now();

        let result = match timeout(budget, model.infer(self.config.tracing_enabled)).await {
            Ok(result) => result,
            Err(_) => Err(DomainError::timeout(budget.as_millis() as u64)),
        };

        match &result {
            Err(e) if !e.is_configuration() => permit.failure(),
            _ => permit.success(),
        }

        record_path("primary", model.name(), started, &result);
        result
    }

    async fn run_fallback(
        &self,
        request: &InferenceRequest,
        service: Arc<ServiceConfig>,
    ) -> Result<Vec<RawScoredItem>, DomainError> {
        let degraded = request.degraded(self.config.lower_recall_num, self.config.lower_rank_num);

        debug!(
            recall_num = degraded.recall_num(),
            items = degraded.items().len(),
            model = %self.config.fallback_model,
            "Fallback request"
        );

        let model = self
            .factory
            .create(&self.config.fallback_model, degraded, service)?;
        let started = Instant::now();

        let result = model.infer(self.config.tracing_enabled).await;

        record_path("fallback", model.name(), started, &result);
        result
    }
}

fn record_path(
    path: &'static str,
    model: &str,
    started: Instant,
    result: &Result<Vec<RawScoredItem>, DomainError>,
) {
    counter!("dispatcher_path_total", "path" => path).increment(1);

    record_inference(InferenceMetricParams {
        model,
        path,
        duration: started.elapsed(),
        success: result.is_ok(),
        items: result.as_ref().map(Vec::len).unwrap_or(0),
    });
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;
    use crate::domain::backend::{ConnectionPool, MockBackend, PoolConfig, Tensor};
    use crate::domain::cache::MockCache;
    use crate::domain::feature::MockFeatureStore;
    use crate::domain::model::{INPUT_ITEMS, OUTPUT_ITEM_IDS, OUTPUT_SCORES};
    use crate::domain::recommend::ServiceId;
    use crate::domain::resilience::{CircuitBreakerConfig, CircuitState};
    use crate::domain::PredictResponse;
    use crate::infrastructure::cache::FeatureCache;
    use crate::infrastructure::feature::{SampleAssembler, SampleRegistry};

    const LOWER_RANK: usize = 2;
    const LOWER_RECALL: u32 = 5;

    struct Fixture {
        dispatcher: Dispatcher,
        backend: MockBackend,
        service: Arc<ServiceConfig>,
        breakers: Arc<CircuitBreakerRegistry>,
        store: Arc<MockFeatureStore>,
    }

    fn fixture(ttl_secs: i64) -> Fixture {
        fixture_with_fallback(ttl_secs, "fm")
    }

    fn fixture_with_fallback(ttl_secs: i64, fallback_model: &str) -> Fixture {
        let backend = MockBackend::new();
        backend.respond_with(|req| {
            let n = req.input(INPUT_ITEMS).map(|t| t.len()).unwrap_or(0);
            Ok(PredictResponse::default().with_output(OUTPUT_SCORES, Tensor::floats(vec![0.5; n])))
        });

        let store = Arc::new(MockFeatureStore::new().with_entry("user:u1", vec![1u8]));
        let pool = ConnectionPool::new(Arc::new(backend.clone()), PoolConfig::default());
        let service = Arc::new(
            ServiceConfig::for_tests("rec-home")
                .with_pool(pool)
                .with_feature_store(store.clone()),
        );

        let breakers = Arc::new(CircuitBreakerRegistry::new(CircuitBreakerConfig {
            request_volume_threshold: 2,
            error_percent_threshold: 50,
            sleep_window: Duration::from_secs(5),
            timeout: Duration::from_millis(100),
            ..Default::default()
        }));

        let assembler = SampleAssembler::new(
            FeatureCache::new(Arc::new(MockCache::new()), ttl_secs),
            Arc::default(),
        );
        let factory = ModelFactory::new(
            SampleRegistry::standard(assembler),
            Duration::from_millis(80),
        );

        let dispatcher = Dispatcher::new(
            DispatcherConfig {
                fallback_model: fallback_model.to_string(),
                lower_recall_num: LOWER_RECALL,
                lower_rank_num: LOWER_RANK,
                ..Default::default()
            },
            breakers.clone(),
            factory,
            ResultAggregator::new(4),
        );

        Fixture {
            dispatcher,
            backend,
            service,
            breakers,
            store,
        }
    }

    fn request(items: &[&str]) -> InferenceRequest {
        InferenceRequest::new(ServiceId::new("rec-home", "default", "test"), "u1")
            .with_items(items.iter().map(|i| i.to_string()).collect())
            .with_recall_num(50)
            .with_model_type("deepfm")
    }

    /// Fails every call carrying more items than the fallback keeps
    fn fail_primary(backend: &MockBackend) {
        backend.respond_with(|req| {
            let n = req.input(INPUT_ITEMS).map(|t| t.len()).unwrap_or(0);
            if n > LOWER_RANK {
                return Err(DomainError::backend("connection refused"));
            }
            Ok(PredictResponse::default().with_output(OUTPUT_SCORES, Tensor::floats(vec![0.25; n])))
        });
    }

    #[tokio::test]
    async fn test_healthy_backend_scores_every_item() {
        let f = fixture(0);

        let items = f
            .dispatcher
            .dispatch(request(&["i1", "i2", "i3"]), f.service.clone())
            .await
            .unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(f.backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_model_skips_backend_and_fallback() {
        let f = fixture(0);
        let request = request(&["i1"]).with_model_type("xgboost");

        let err = f.dispatcher.dispatch(request, f.service.clone()).await.unwrap_err();

        assert!(err.is_configuration());
        assert_eq!(f.backend.call_count(), 0);
        assert_eq!(f.store.call_count(), 0);
    }

    #[tokio::test]
    async fn test_primary_error_runs_degraded_fallback() {
        let f = fixture(0);
        fail_primary(&f.backend);

        let items = f
            .dispatcher
            .dispatch(request(&["i1", "i2", "i3", "i4"]), f.service.clone())
            .await
            .unwrap();

        assert_eq!(items.len(), LOWER_RANK);
        let sent = f.backend.requests();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].input(INPUT_ITEMS).unwrap().len(), LOWER_RANK);
    }

    #[tokio::test(start_paused = true)]
    async fn test_primary_timeout_runs_fallback() {
        let f = fixture(0);
        f.backend.set_delay(Duration::from_millis(500));

        let err = f
            .dispatcher
            .dispatch(request(&["i1", "i2", "i3"]), f.service.clone())
            .await
            .unwrap_err();

        // Fallback shares the slow backend and hits its own call timeout
        assert!(matches!(err, DomainError::Timeout { timeout_ms: 80 }));
        assert_eq!(f.backend.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_primary_falls_back_to_truncated_request() {
        let f = fixture(0);
        f.backend.delay_with(|req| {
            let n = req.input(INPUT_ITEMS).map(|t| t.len()).unwrap_or(0);
            if n > LOWER_RANK {
                Duration::from_millis(500)
            } else {
                Duration::ZERO
            }
        });

        let items = f
            .dispatcher
            .dispatch(request(&["i1", "i2", "i3", "i4"]), f.service.clone())
            .await
            .unwrap();

        let mut ids: Vec<&str> = items.iter().map(|i| i.item_id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["i1", "i2"]);
        let sent = f.backend.requests();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].input(INPUT_ITEMS).unwrap().len(), 4);
        assert_eq!(sent[1].input(INPUT_ITEMS).unwrap().len(), LOWER_RANK);
    }

    #[tokio::test]
    async fn test_retrieval_fallback_uses_lower_recall() {
        let f = fixture_with_fallback(0, "youtube_dnn");
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        f.backend.respond_with(move |_| {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(DomainError::backend("connection refused"));
            }
            let ids = (0..30).map(|i| Bytes::from(format!("c{}", i))).collect();
            Ok(PredictResponse::default()
                .with_output(OUTPUT_ITEM_IDS, Tensor::strings(ids))
                .with_output(OUTPUT_SCORES, Tensor::floats(vec![0.5; 30])))
        });
        let request = InferenceRequest::new(ServiceId::new("rec-home", "default", "test"), "u1")
            .with_recall_num(50)
            .with_model_type("dssm");

        let items = f.dispatcher.dispatch(request, f.service.clone()).await.unwrap();

        assert_eq!(items.len(), LOWER_RECALL as usize);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fallback_failure_is_surfaced() {
        let f = fixture(0);
        f.backend
            .respond_with(|_| Err(DomainError::backend("connection refused")));

        let err = f
            .dispatcher
            .dispatch(request(&["i1"]), f.service.clone())
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert_eq!(f.backend.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_routes_straight_to_fallback() {
        let f = fixture(0);
        fail_primary(&f.backend);
        let items = ["i1", "i2", "i3", "i4"];

        for _ in 0..2 {
            f.dispatcher.dispatch(request(&items), f.service.clone()).await.unwrap();
        }
        let breaker = f.breakers.get("grpcServer").await;
        assert_eq!(breaker.state(), CircuitState::Open);

        let calls_when_opened = f.backend.call_count();
        for _ in 0..3 {
            let scored = f.dispatcher.dispatch(request(&items), f.service.clone()).await.unwrap();
            assert_eq!(scored.len(), LOWER_RANK);
        }

        // One backend call per request: the fallback only
        assert_eq!(f.backend.call_count(), calls_when_opened + 3);
        assert!(f
            .backend
            .requests()
            .iter()
            .skip(calls_when_opened)
            .all(|r| r.input(INPUT_ITEMS).unwrap().len() == LOWER_RANK));

        tokio::time::advance(Duration::from_secs(6)).await;
        f.backend.respond_with(|req| {
            let n = req.input(INPUT_ITEMS).map(|t| t.len()).unwrap_or(0);
            Ok(PredictResponse::default().with_output(OUTPUT_SCORES, Tensor::floats(vec![0.5; n])))
        });

        let scored = f.dispatcher.dispatch(request(&items), f.service.clone()).await.unwrap();
        assert_eq!(scored.len(), items.len());
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_recall_request_under_ranking_fallback_is_empty_success() {
        let f = fixture(0);
        f.backend
            .respond_with(|_| Err(DomainError::backend("connection refused")));
        let request = InferenceRequest::new(ServiceId::new("rec-home", "default", "test"), "u1")
            .with_recall_num(50)
            .with_model_type("dssm");

        let items = f.dispatcher.dispatch(request, f.service.clone()).await.unwrap();

        assert!(items.is_empty());
        assert_eq!(f.backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_cached_features_skip_store_on_second_request() {
        let f = fixture(60);

        f.dispatcher.dispatch(request(&["i1", "i2"]), f.service.clone()).await.unwrap();
        let after_first = f.store.call_count();
        f.dispatcher.dispatch(request(&["i1", "i2"]), f.service.clone()).await.unwrap();

        assert_eq!(after_first, 3);
        assert_eq!(f.store.call_count(), after_first);
    }

    #[tokio::test]
    async fn test_warm_cache_scores_new_candidates() {
        let f = fixture(60);

        f.dispatcher.dispatch(request(&["i1", "i2"]), f.service.clone()).await.unwrap();
        let items = f
            .dispatcher
            .dispatch(request(&["i7", "i8", "i9"]), f.service.clone())
            .await
            .unwrap();

        let mut ids: Vec<&str> = items.iter().map(|i| i.item_id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["i7", "i8", "i9"]);
        assert_eq!(f.backend.requests()[1].input(INPUT_ITEMS).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_fallback_on_primary_model_sends_truncated_items_with_warm_cache() {
        let f = fixture(60);
        fail_primary(&f.backend);
        let request = request(&["i1", "i2", "i3", "i4"]).with_model_type("fm");

        let items = f.dispatcher.dispatch(request, f.service.clone()).await.unwrap();

        assert_eq!(items.len(), LOWER_RANK);
        let counts: Vec<usize> = f
            .backend
            .requests()
            .iter()
            .map(|r| r.input(INPUT_ITEMS).unwrap().len())
            .collect();
        assert_eq!(counts, vec![4, LOWER_RANK]);
    }
}
