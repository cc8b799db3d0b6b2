//! Uniform inference contract

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::recommend::RawScoredItem;
use crate::domain::DomainError;

pub const INPUT_USER: &str = "userExamples";
pub const INPUT_USER_CONTEXT: &str = "userContextExamples";
pub const INPUT_ITEMS: &str = "itemExamples";

/// Per-item scores, aligned with the item input or `OUTPUT_ITEM_IDS`
pub const OUTPUT_SCORES: &str = "scores";
/// Candidate ids produced by retrieval models
pub const OUTPUT_ITEM_IDS: &str = "item_ids";

/// A model bound to one request and one service
///
/// Built fresh per request by the model factory and dropped afterwards.
#[async_trait]
pub trait InferenceModel: Send + Sync + Debug {
    fn name(&self) -> &str;

    /// Runs inference inside an instrumented span
    async fn infer_traced(&self) -> Result<Vec<RawScoredItem>, DomainError>;

    /// Runs inference without span instrumentation
    async fn infer_untraced(&self) -> Result<Vec<RawScoredItem>, DomainError>;

    async fn infer(&self, tracing_enabled: bool) -> Result<Vec<RawScoredItem>, DomainError> {
        if tracing_enabled {
            self.infer_traced().await
        } else {
            self.infer_untraced().await
        }
    }
}
