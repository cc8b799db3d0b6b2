//! Ranking models: one score per supplied candidate item

use async_trait::async_trait;
use tracing::{info_span, Instrument};

use super::ModelBinding;
use crate::domain::model::{InferenceModel, OUTPUT_SCORES};
use crate::domain::recommend::RawScoredItem;
use crate::domain::DomainError;

/// `fm`, `deepfm` and `wide_deep`
#[derive(Debug)]
pub struct RankingModel {
    binding: ModelBinding,
}

impl RankingModel {
    pub fn new(binding: ModelBinding) -> Self {
        Self { binding }
    }

    async fn run(&self) -> Result<Vec<RawScoredItem>, DomainError> {
        // Nothing to rank
        if self.binding.request().items().is_empty() {
            return Ok(Vec::new());
        }

        let features = self.binding.assemble().await?;
        let request = self.binding.predict_request(&features, &[OUTPUT_SCORES]);
        let response = self.binding.predict(&request).await?;

        let scores = response.output(OUTPUT_SCORES)?.as_floats().ok_or_else(|| {
            DomainError::backend(format!("Output '{}' is not a float tensor", OUTPUT_SCORES))
        })?;

        // Identities come from the request, never from the assembled bundle
        let items = self.binding.request().items();
        if features.items().len() != items.len() {
            return Err(DomainError::internal(format!(
                "Assembled {} item records for {} candidates",
                features.items().len(),
                items.len()
            )));
        }
        if scores.len() != items.len() {
            return Err(DomainError::backend(format!(
                "Backend returned {} scores for {} items",
                scores.len(),
                items.len()
            )));
        }

        Ok(items
            .iter()
            .zip(scores)
            .map(|(item_id, score)| RawScoredItem::new(item_id.as_str(), f64::from(*score)))
            .collect())
    }
}

#[async_trait]
impl InferenceModel for RankingModel {
    fn name(&self) -> &str {
        self.binding.kind().as_str()
    }

    async fn infer_traced(&self) -> Result<Vec<RawScoredItem>, DomainError> {
        let span = info_span!(
            "model.infer",
            model = %self.binding.kind(),
            data_id = %self.binding.service().service_id(),
            items = self.binding.request().items().len(),
        );

        self.run().instrument(span).await
    }

    async fn infer_untraced(&self) -> Result<Vec<RawScoredItem>, DomainError> {
        self.run().await
    }
}
