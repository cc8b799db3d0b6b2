//! Recommendation domain - Inference requests and response envelopes

mod request;
mod response;

pub use request::{InferenceRequest, SampleKind, ServiceId};
pub use response::{RawScoredItem, RecommendResponse, ScoredItem, STATUS_FAILURE, STATUS_SUCCESS};
