//! Response envelope and scored items

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

pub const STATUS_SUCCESS: u16 = 200;
pub const STATUS_FAILURE: u16 = 404;

/// Backend-produced score for one item, before presentation formatting
#[derive(Debug, Clone, PartialEq)]
pub struct RawScoredItem {
    pub item_id: String,
    pub score: f64,
}

impl RawScoredItem {
    pub fn new(item_id: impl Into<String>, score: f64) -> Self {
        Self {
            item_id: item_id.into(),
            score,
        }
    }
}

/// Response item with a presentation-stable score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    #[serde(rename = "itemid")]
    pub item_id: String,
    pub score: f32,
}

/// Response envelope returned for every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendResponse {
    pub code: u16,
    pub message: String,
    pub items: Vec<ScoredItem>,
}

impl Default for RecommendResponse {
    fn default() -> Self {
        Self {
            code: STATUS_FAILURE,
            message: String::new(),
            items: Vec::new(),
        }
    }
}

impl RecommendResponse {
    pub fn success(items: Vec<ScoredItem>) -> Self {
        Self {
            code: STATUS_SUCCESS,
            message: "success".to_string(),
            items,
        }
    }

    pub fn failure(error: &DomainError) -> Self {
        Self {
            message: error.to_string(),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == STATUS_SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_failure_envelope() {
        let response = RecommendResponse::default();
        assert_eq!(response.code, 404);
        assert!(response.items.is_empty());
        assert!(!response.is_success());
    }

    #[test]
    fn test_failure_carries_error_text() {
        let response = RecommendResponse::failure(&DomainError::configuration("Unknown model 'x'"));
        assert_eq!(response.code, 404);
        assert_eq!(response.message, "Configuration error: Unknown model 'x'");
    }

    #[test]
    fn test_item_serializes_with_wire_name() {
        let item = ScoredItem {
            item_id: "i1".to_string(),
            score: 0.5,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["itemid"], "i1");
    }
}
