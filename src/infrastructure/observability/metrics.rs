//! Prometheus metrics infrastructure

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, response::IntoResponse, routing::get, Router};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use super::config::MetricsConfig;

/// Prometheus metrics handle for serving metrics endpoint
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl PrometheusMetrics {
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Initialize Prometheus metrics
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::info!("Prometheus metrics disabled");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            gauge!("infer_gateway_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);

            tracing::info!("Prometheus metrics initialized at {}", config.path);

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

/// Create the metrics router
pub fn create_metrics_router(metrics: PrometheusMetrics, path: &str) -> Router {
    Router::new()
        .route(path, get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<PrometheusMetrics>) -> impl IntoResponse {
    metrics.render()
}

/// Record the outcome of one gateway request
///
/// `outcome` is one of `success`, `failure`, `deadline` or `cancelled`.
pub fn record_recommend_request(data_id: &str, outcome: &str, duration: Duration) {
    let labels = [
        ("data_id", data_id.to_string()),
        ("outcome", outcome.to_string()),
    ];

    counter!("recommend_requests_total", &labels).increment(1);
    histogram!("recommend_request_duration_seconds", &labels).record(duration.as_secs_f64());
}

/// Parameters for inference metrics
pub struct InferenceMetricParams<'a> {
    pub model: &'a str,
    /// `primary` or `fallback`
    pub path: &'a str,
    pub duration: Duration,
    pub success: bool,
    pub items: usize,
}

/// Record one model invocation
pub fn record_inference(params: InferenceMetricParams<'_>) {
    let labels = [
        ("model", params.model.to_string()),
        ("path", params.path.to_string()),
        ("status", if params.success { "success" } else { "error" }.to_string()),
    ];

    counter!("inference_requests_total", &labels).increment(1);
    histogram!("inference_duration_seconds", &labels).record(params.duration.as_secs_f64());

    if params.success {
        counter!("inference_items_scored_total", &labels).increment(params.items as u64);
    } else {
        counter!("inference_errors_total", &labels).increment(1);
    }
}
