//! Feature records and assembled bundles

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// One entity's serialized features
///
/// The payload is opaque to the gateway; it is forwarded to the backend as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRecord {
    key: String,
    #[serde(with = "payload_base64")]
    payload: Bytes,
}

impl FeatureRecord {
    pub fn new(key: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            payload: payload.into(),
        }
    }

    /// Record with no features, used when an entity is absent or unavailable
    pub fn empty(key: impl Into<String>) -> Self {
        Self::new(key, Bytes::new())
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Feature bundle for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleFeatures {
    user: FeatureRecord,
    user_context: FeatureRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    items: Option<Vec<FeatureRecord>>,
}

impl ExampleFeatures {
    /// Bundle for the recall stage: no item features
    pub fn recall(user: FeatureRecord, user_context: FeatureRecord) -> Self {
        Self {
            user,
            user_context,
            items: None,
        }
    }

    /// Bundle for the rank stage: one record per candidate item
    pub fn rank(user: FeatureRecord, user_context: FeatureRecord, items: Vec<FeatureRecord>) -> Self {
        Self {
            user,
            user_context,
            items: Some(items),
        }
    }

    pub fn user(&self) -> &FeatureRecord {
        &self.user
    }

    pub fn user_context(&self) -> &FeatureRecord {
        &self.user_context
    }

    pub fn items(&self) -> &[FeatureRecord] {
        self.items.as_deref().unwrap_or(&[])
    }

    pub fn has_items(&self) -> bool {
        self.items.is_some()
    }
}

mod payload_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(payload: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(payload))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}
