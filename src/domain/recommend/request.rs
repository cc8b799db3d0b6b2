//! Normalized inference request

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of the service a request is addressed to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceId {
    pub data_id: String,
    pub group_id: String,
    pub namespace: String,
}

impl ServiceId {
    pub fn new(
        data_id: impl Into<String>,
        group_id: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            data_id: data_id.into(),
            group_id: group_id.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.group_id, self.data_id)
    }
}

/// Which feature bundle a request needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleKind {
    /// No candidate items yet: user and user-context features only
    Recall,
    /// Candidate items supplied: user, user-context and per-item features
    Rank,
}

impl SampleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recall => "recall",
            Self::Rank => "rank",
        }
    }
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scoring request for one user against a candidate item set
///
/// Immutable once built; the degraded variant used by the fallback path is a
/// new value produced by [`InferenceRequest::degraded`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequest {
    service: ServiceId,
    user_id: String,
    items: Vec<String>,
    recall_num: u32,
    model_type: Option<String>,
}

impl InferenceRequest {
    pub fn new(service: ServiceId, user_id: impl Into<String>) -> Self {
        Self {
            service,
            user_id: user_id.into(),
            items: Vec::new(),
            recall_num: 0,
            model_type: None,
        }
    }

    pub fn with_items(mut self, items: Vec<String>) -> Self {
        self.items = items;
        self
    }

    pub fn with_recall_num(mut self, recall_num: u32) -> Self {
        self.recall_num = recall_num;
        self
    }

    pub fn with_model_type(mut self, model_type: impl Into<String>) -> Self {
        let model_type = model_type.into();
        self.model_type = (!model_type.trim().is_empty()).then_some(model_type);
        self
    }

    pub fn service(&self) -> &ServiceId {
        &self.service
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn recall_num(&self) -> u32 {
        self.recall_num
    }

    /// Lower-cased model type hint, if any
    pub fn model_type(&self) -> Option<String> {
        self.model_type.as_ref().map(|m| m.to_lowercase())
    }

    pub fn sample_kind(&self) -> SampleKind {
        if self.items.is_empty() {
            SampleKind::Recall
        } else {
            SampleKind::Rank
        }
    }

    /// Cheaper copy of this request for the fallback path.
    ///
    /// Recall count and item list never grow: each is clamped to the smaller
    /// of the current value and the configured lower bound.
    pub fn degraded(&self, lower_recall_num: u32, lower_rank_num: usize) -> Self {
        let keep = self.items.len().min(lower_rank_num);

        Self {
            service: self.service.clone(),
            user_id: self.user_id.clone(),
            items: self.items[..keep].to_vec(),
            recall_num: self.recall_num.min(lower_recall_num),
            model_type: self.model_type.clone(),
        }
    }
}
