//! Time-windowed cache of assembled feature bundles

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::warn;

use crate::domain::cache::{Cache, FeatureCacheKey};
use crate::domain::feature::ExampleFeatures;
use crate::domain::DomainError;

/// Feature bundle cache
///
/// A TTL of zero or less disables caching entirely. Read failures and entries
/// that no longer decode are reported as misses.
#[derive(Debug, Clone)]
pub struct FeatureCache {
    cache: Arc<dyn Cache>,
    ttl_secs: i64,
}

impl FeatureCache {
    pub fn new(cache: Arc<dyn Cache>, ttl_secs: i64) -> Self {
        Self { cache, ttl_secs }
    }

    pub fn is_enabled(&self) -> bool {
        self.ttl_secs > 0
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs.max(0) as u64)
    }

    pub async fn get(&self, key: &FeatureCacheKey) -> Option<ExampleFeatures> {
        if !self.is_enabled() {
            return None;
        }

        let decoded = match self.cache.get_raw(key.as_str()).await {
            Ok(Some(raw)) => serde_json::from_str::<ExampleFeatures>(&raw)
                .map(Some)
                .map_err(|e| DomainError::cache(format!("Undecodable entry: {}", e))),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };

        match decoded {
            Ok(Some(bundle)) => {
                counter!("feature_cache_requests_total", "result" => "hit").increment(1);
                Some(bundle)
            }
            Ok(None) => {
                counter!("feature_cache_requests_total", "result" => "miss").increment(1);
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Unreadable feature cache entry, treating as miss");
                counter!("feature_cache_requests_total", "result" => "error").increment(1);
                None
            }
        }
    }

    /// Stores a bundle; failures are logged and otherwise ignored
    pub async fn put(&self, key: &FeatureCacheKey, bundle: &ExampleFeatures) {
        if !self.is_enabled() {
            return;
        }

        let written = match serde_json::to_string(bundle) {
            Ok(raw) => self.cache.set_raw(key.as_str(), &raw, self.ttl()).await,
            Err(e) => Err(DomainError::cache(format!("Unencodable bundle: {}", e))),
        };

        if let Err(e) = written {
            warn!(key = %key, error = %e, "Failed to write feature cache entry");
        }
    }
}
