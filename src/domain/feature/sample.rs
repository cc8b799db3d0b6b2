//! Sample strategies - how a feature bundle is built for a request

use std::fmt::Debug;

use async_trait::async_trait;

use super::ExampleFeatures;
use crate::domain::recommend::{InferenceRequest, SampleKind};
use crate::domain::service::ServiceConfig;
use crate::domain::DomainError;

/// Everything a strategy needs to assemble one request's features
#[derive(Debug, Clone, Copy)]
pub struct SampleContext<'a> {
    pub request: &'a InferenceRequest,
    pub service: &'a ServiceConfig,
    pub model_name: &'a str,
}

/// Builds the feature bundle for one kind of request
#[async_trait]
pub trait SampleStrategy: Send + Sync + Debug {
    /// The request kind this strategy serves
    fn kind(&self) -> SampleKind;

    async fn assemble(&self, ctx: SampleContext<'_>) -> Result<ExampleFeatures, DomainError>;
}
