//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, BackendSettings, CircuitBreakerSettings, FeatureCacheSettings, GatewaySettings,
    LogFormat, LoggingConfig, MembershipFilterSettings, ServerConfig, ServiceSettings,
};
