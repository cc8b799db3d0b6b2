//! Inference Gateway
//!
//! Deadline-bounded scoring in front of a model-serving backend:
//! - Per-service configuration with live reload of membership filters
//! - Feature assembly from a key-value store with an optional bundle cache
//! - Circuit-breaker protected backend calls with a degraded fallback path
//! - Bounded-concurrency result formatting

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use api::state::AppState;
use domain::{CircuitBreakerRegistry, MembershipFilters, ReloadListener, ServiceRegistry};
use infrastructure::{
    cache::{CacheFactory, FeatureCache},
    feature::{SampleAssembler, SampleRegistry},
    model::ModelFactory,
    registry::{ServiceBuilder, StaticServiceRegistry},
    serving::{Dispatcher, DispatcherConfig, Gateway, GatewayConfig, ResultAggregator},
};
use tracing::info;

/// Create the application state with default configuration
pub async fn create_app_state() -> anyhow::Result<AppState> {
    create_app_state_with_config(&AppConfig::default()).await
}

/// Create the application state with custom configuration
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    // Feature bundle cache
    let cache = CacheFactory::new()
        .create(&config.feature_cache.to_cache_config())
        .await?;
    let feature_cache = FeatureCache::new(cache, config.feature_cache.ttl_secs);

    info!(
        backend = ?config.feature_cache.backend,
        enabled = feature_cache.is_enabled(),
        "Feature cache initialized"
    );

    // Membership filters, rebuilt whenever a service reloads
    let filters = Arc::new(MembershipFilters::new(
        config.membership_filter.to_filter_settings(),
    ));

    let samples = SampleRegistry::standard(SampleAssembler::new(feature_cache, filters.clone()));
    let factory = ModelFactory::new(samples, config.backend.call_timeout());

    let breakers = Arc::new(CircuitBreakerRegistry::new(
        config.circuit_breaker.to_breaker_config(),
    ));

    let gateway_settings = &config.gateway;
    let dispatcher = Arc::new(Dispatcher::new(
        DispatcherConfig {
            circuit_name: gateway_settings.circuit_name.clone(),
            fallback_model: gateway_settings.fallback_model.clone(),
            lower_recall_num: gateway_settings.lower_recall_num,
            lower_rank_num: gateway_settings.lower_rank_num,
            tracing_enabled: gateway_settings.tracing_enabled,
        },
        breakers.clone(),
        factory,
        ResultAggregator::new(gateway_settings.aggregator_concurrency),
    ));

    // Services
    let registry = Arc::new(
        StaticServiceRegistry::new().with_listener(filters as Arc<dyn ReloadListener>),
    );
    let builder = ServiceBuilder::new(config.backend.clone());

    for settings in &config.services {
        let service = builder.build(settings).await?;
        registry.insert(service);
        info!(data_id = %settings.data_id, model = %settings.model_name, "Service registered");
    }

    let gateway = Gateway::new(
        GatewayConfig {
            request_timeout: gateway_settings.request_timeout(),
            config_host: gateway_settings.config_host.clone(),
            config_port: gateway_settings.config_port,
        },
        registry.clone() as Arc<dyn ServiceRegistry>,
        dispatcher,
    );

    info!(services = config.services.len(), "Application state initialized");

    Ok(AppState {
        gateway,
        registry,
        breakers,
        circuit_name: gateway_settings.circuit_name.clone(),
    })
}
