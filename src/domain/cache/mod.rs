//! Cache domain - Key-value caching with per-entry TTL

mod key;
mod store;

pub use key::FeatureCacheKey;
pub use store::Cache;

#[cfg(test)]
pub use store::mock::MockCache;
