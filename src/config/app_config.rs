use std::time::Duration;

use serde::Deserialize;

use crate::domain::filter::FilterSettings;
use crate::domain::resilience::CircuitBreakerConfig;
use crate::infrastructure::cache::{CacheConfig, CacheType};
use crate::infrastructure::observability::ObservabilityConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub observability: ObservabilityConfig,
    pub gateway: GatewaySettings,
    pub circuit_breaker: CircuitBreakerSettings,
    pub feature_cache: FeatureCacheSettings,
    pub backend: BackendSettings,
    pub membership_filter: MembershipFilterSettings,
    pub services: Vec<ServiceSettings>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Request pipeline settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Wall-clock budget of a whole request
    pub request_timeout_ms: u64,
    /// Run model invocations inside instrumented spans
    pub tracing_enabled: bool,
    /// Recall count used on the fallback path
    pub lower_recall_num: u32,
    /// Candidate items kept on the fallback path
    pub lower_rank_num: usize,
    pub fallback_model: String,
    pub circuit_name: String,
    pub aggregator_concurrency: usize,
    /// Configuration server contacted for listener subscriptions
    pub config_host: String,
    pub config_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub error_percent_threshold: u32,
    pub request_volume_threshold: u32,
    pub sleep_window_ms: u64,
    pub timeout_ms: u64,
    pub rolling_window_ms: u64,
    pub max_concurrent_requests: usize,
}

/// Feature bundle cache; a TTL of zero or less disables it
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeatureCacheSettings {
    pub backend: CacheType,
    pub ttl_secs: i64,
    pub max_capacity: u64,
    pub redis_url: Option<String>,
    pub key_prefix: Option<String>,
}

/// Prediction backend connection settings shared by every service
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub call_timeout_ms: u64,
    pub pool_size: usize,
    pub acquire_timeout_ms: u64,
    /// Default model version; a service may pin its own
    pub model_version: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MembershipFilterSettings {
    pub expected_items: usize,
    pub false_positive_rate: f64,
}

/// One served data-id
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSettings {
    pub data_id: String,
    #[serde(default = "default_group_id")]
    pub group_id: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub model_name: String,
    #[serde(default = "default_model_type")]
    pub default_model_type: String,
    #[serde(default)]
    pub model_version: Option<i64>,
    /// Prediction backend base URL
    pub endpoint: String,
    /// Feature store; `None` uses an empty in-process store
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_user_key_prefix")]
    pub user_key_prefix: String,
    #[serde(default = "default_item_key_prefix")]
    pub item_key_prefix: String,
    #[serde(default = "default_user_ids_key")]
    pub user_ids_key: String,
    #[serde(default = "default_item_ids_key")]
    pub item_ids_key: String,
}

fn default_group_id() -> String {
    "DEFAULT_GROUP".to_string()
}

fn default_namespace() -> String {
    "public".to_string()
}

fn default_model_type() -> String {
    "fm".to_string()
}

fn default_user_key_prefix() -> String {
    "user:".to_string()
}

fn default_item_key_prefix() -> String {
    "item:".to_string()
}

fn default_user_ids_key() -> String {
    "users".to_string()
}

fn default_item_ids_key() -> String {
    "items".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: 150,
            tracing_enabled: false,
            lower_recall_num: 20,
            lower_rank_num: 50,
            fallback_model: "fm".to_string(),
            circuit_name: "grpcServer".to_string(),
            aggregator_concurrency: 64,
            config_host: "127.0.0.1".to_string(),
            config_port: 8848,
        }
    }
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            error_percent_threshold: 50,
            request_volume_threshold: 20,
            sleep_window_ms: 5000,
            timeout_ms: 100,
            rolling_window_ms: 10_000,
            max_concurrent_requests: 100,
        }
    }
}

impl Default for FeatureCacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheType::InMemory,
            ttl_secs: 0,
            max_capacity: 100_000,
            redis_url: None,
            key_prefix: None,
        }
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            call_timeout_ms: 80,
            pool_size: 16,
            acquire_timeout_ms: 20,
            model_version: None,
        }
    }
}

impl Default for MembershipFilterSettings {
    fn default() -> Self {
        let filter = FilterSettings::default();

        Self {
            expected_items: filter.expected_items,
            false_positive_rate: filter.false_positive_rate,
        }
    }
}

impl GatewaySettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl CircuitBreakerSettings {
    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            timeout: Duration::from_millis(self.timeout_ms),
            max_concurrent_requests: self.max_concurrent_requests,
            request_volume_threshold: self.request_volume_threshold,
            sleep_window: Duration::from_millis(self.sleep_window_ms),
            error_percent_threshold: self.error_percent_threshold,
            rolling_window: Duration::from_millis(self.rolling_window_ms),
            ..Default::default()
        }
    }
}

impl FeatureCacheSettings {
    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig {
            cache_type: self.backend,
            redis_url: self.redis_url.clone(),
            key_prefix: self.key_prefix.clone(),
            max_capacity: self.max_capacity,
            max_ttl: Duration::from_secs(self.ttl_secs.max(1) as u64),
        }
    }
}

impl BackendSettings {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

impl MembershipFilterSettings {
    pub fn to_filter_settings(&self) -> FilterSettings {
        FilterSettings {
            expected_items: self.expected_items,
            false_positive_rate: self.false_positive_rate,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
