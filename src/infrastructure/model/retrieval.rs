//! Retrieval models: the backend proposes candidates with scores

use async_trait::async_trait;
use tracing::{info_span, Instrument};

use super::ModelBinding;
use crate::domain::model::{InferenceModel, OUTPUT_ITEM_IDS, OUTPUT_SCORES};
use crate::domain::recommend::RawScoredItem;
use crate::domain::DomainError;

/// `dssm` and `youtube_dnn`
#[derive(Debug)]
pub struct RetrievalModel {
    binding: ModelBinding,
}

impl RetrievalModel {
    pub fn new(binding: ModelBinding) -> Self {
        Self { binding }
    }

    async fn run(&self) -> Result<Vec<RawScoredItem>, DomainError> {
        let features = self.binding.assemble().await?;
        let request = self
            .binding
            .predict_request(&features, &[OUTPUT_ITEM_IDS, OUTPUT_SCORES]);
        let response = self.binding.predict(&request).await?;

        let ids = response.output(OUTPUT_ITEM_IDS)?.as_strings().ok_or_else(|| {
            DomainError::backend(format!("Output '{}' is not a string tensor", OUTPUT_ITEM_IDS))
        })?;
        let scores = response.output(OUTPUT_SCORES)?.as_floats().ok_or_else(|| {
            DomainError::backend(format!("Output '{}' is not a float tensor", OUTPUT_SCORES))
        })?;

        if ids.len() != scores.len() {
            return Err(DomainError::backend(format!(
                "Backend returned {} ids but {} scores",
                ids.len(),
                scores.len()
            )));
        }

        // Zero leaves the candidate list uncapped
        let recall_num = match self.binding.request().recall_num() {
            0 => usize::MAX,
            n => n as usize,
        };

        Ok(ids
            .iter()
            .zip(scores)
            .take(recall_num)
            .map(|(id, score)| {
                RawScoredItem::new(String::from_utf8_lossy(id).into_owned(), f64::from(*score))
            })
            .collect())
    }
}

#[async_trait]
impl InferenceModel for RetrievalModel {
    fn name(&self) -> &str {
        self.binding.kind().as_str()
    }

    async fn infer_traced(&self) -> Result<Vec<RawScoredItem>, DomainError> {
        let span = info_span!(
            "model.infer",
            model = %self.binding.kind(),
            data_id = %self.binding.service().service_id(),
            recall_num = self.binding.request().recall_num(),
        );

        self.run().instrument(span).await
    }

    async fn infer_untraced(&self) -> Result<Vec<RawScoredItem>, DomainError> {
        self.run().await
    }
}
