//! Feature cache keys

use std::fmt;

use sha2::{Digest, Sha256};

/// Composite key of an assembled feature bundle
///
/// Formatted as `entityId + serviceId + modelName + "_samples"`. Rank
/// bundles also carry a digest of their candidate list ahead of the suffix,
/// so a bundle is only ever restored for the exact items it was built from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureCacheKey(String);

impl FeatureCacheKey {
    pub const SUFFIX: &'static str = "_samples";

    pub fn new(entity_id: &str, service_id: &str, model_name: &str) -> Self {
        Self(format!("{}{}{}{}", entity_id, service_id, model_name, Self::SUFFIX))
    }

    /// Key of a rank bundle built for `items`, in order
    pub fn with_candidates(entity_id: &str, service_id: &str, model_name: &str, items: &[String]) -> Self {
        Self(format!(
            "{}{}{}#{}{}",
            entity_id,
            service_id,
            model_name,
            candidates_digest(items),
            Self::SUFFIX
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeatureCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// First 8 bytes of a length-prefixed SHA-256 over the ids, as hex
fn candidates_digest(items: &[String]) -> String {
    let mut hasher = Sha256::new();
    for item in items {
        hasher.update((item.len() as u64).to_le_bytes());
        hasher.update(item.as_bytes());
    }

    hasher.finalize()[..8]
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}
