//! Scoring endpoint

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::{InferenceRequest, RecommendResponse, ServiceId};

/// Body of `POST /v1/recommend`
#[derive(Debug, Clone, Deserialize)]
pub struct RecommendApiRequest {
    pub data_id: String,
    #[serde(default = "default_group_id")]
    pub group_id: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub user_id: String,
    /// Candidate items; empty for a recall request
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub recall_num: u32,
    #[serde(default)]
    pub model_type: Option<String>,
}

fn default_group_id() -> String {
    "DEFAULT_GROUP".to_string()
}

fn default_namespace() -> String {
    "public".to_string()
}

impl RecommendApiRequest {
    fn into_domain(self) -> Result<InferenceRequest, ApiError> {
        if self.data_id.trim().is_empty() {
            return Err(ApiError::bad_request("data_id must not be empty").with_param("data_id"));
        }

        if self.user_id.trim().is_empty() {
            return Err(ApiError::bad_request("user_id must not be empty").with_param("user_id"));
        }

        let service = ServiceId::new(self.data_id, self.group_id, self.namespace);
        let request = InferenceRequest::new(service, self.user_id)
            .with_items(self.items)
            .with_recall_num(self.recall_num);

        Ok(match self.model_type {
            Some(model_type) => request.with_model_type(model_type),
            None => request,
        })
    }
}

/// Scores the request within the gateway deadline
///
/// Pipeline failures come back as a 200 carrying the failure envelope. A
/// missed deadline is a 504 with the default envelope.
pub async fn recommend(
    State(state): State<AppState>,
    Json(body): Json<RecommendApiRequest>,
) -> Result<Response, ApiError> {
    let request = body.into_domain()?;

    debug!(
        data_id = %request.service().data_id,
        user_id = %request.user_id(),
        items = request.items().len(),
        "Recommend request"
    );

    let response = match state.gateway.recommend(request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(_) => (StatusCode::GATEWAY_TIMEOUT, Json(RecommendResponse::default())).into_response(),
    };

    Ok(response)
}
