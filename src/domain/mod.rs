//! Domain layer - Core inference-serving types and contracts

pub mod backend;
pub mod cache;
pub mod error;
pub mod feature;
pub mod filter;
pub mod model;
pub mod recommend;
pub mod resilience;
pub mod service;

pub use backend::{
    ConnectionManager, ConnectionPool, PoolConfig, PredictRequest, PredictResponse,
    PredictionConnection, Tensor,
};
pub use cache::{Cache, FeatureCacheKey};
pub use error::DomainError;
pub use feature::{ExampleFeatures, FeatureRecord, FeatureStore, SampleContext, SampleStrategy};
pub use filter::{BloomFilter, FilterSettings, IdSource, MembershipFilters, MembershipView};
pub use model::{InferenceModel, ModelFamily, ModelKind};
pub use recommend::{
    InferenceRequest, RawScoredItem, RecommendResponse, SampleKind, ScoredItem, ServiceId,
};
pub use resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState};
pub use service::{ListenerConn, ModelConfig, ReloadListener, ServiceConfig, ServiceRegistry};
