//! Service listing and configuration reload notifications

use axum::extract::{Path, State};
use serde::Serialize;
use tracing::info;

use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::ServiceRegistry;

#[derive(Debug, Clone, Serialize)]
pub struct ServiceSummary {
    pub data_id: String,
    pub group_id: String,
    pub namespace: String,
    pub model_name: String,
    pub default_model_type: String,
    pub subscribed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServicesListResponse {
    pub services: Vec<ServiceSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReloadResponse {
    pub data_id: String,
    pub reloaded: bool,
}

/// GET /admin/services
pub async fn list_services(State(state): State<AppState>) -> Json<ServicesListResponse> {
    let services = state
        .registry
        .data_ids()
        .into_iter()
        .filter_map(|data_id| state.registry.lookup(&data_id))
        .map(|service| ServiceSummary {
            data_id: service.id().data_id.clone(),
            group_id: service.id().group_id.clone(),
            namespace: service.id().namespace.clone(),
            model_name: service.model().model_name.clone(),
            default_model_type: service.model().default_model_type.clone(),
            subscribed: state.registry.is_subscribed(service.service_id()),
        })
        .collect();

    Json(ServicesListResponse { services })
}

/// POST /admin/services/{data_id}/reload
///
/// Rebuilds the service's membership filters from its id sets.
pub async fn reload_service(
    State(state): State<AppState>,
    Path(data_id): Path<String>,
) -> Result<Json<ReloadResponse>, ApiError> {
    state.registry.notify_reload(&data_id).await?;

    info!(data_id = %data_id, "Reload requested through admin API");

    Ok(Json(ReloadResponse {
        data_id,
        reloaded: true,
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;
    use crate::config::{AppConfig, ServiceSettings};

    async fn state() -> AppState {
        let mut config = AppConfig::default();
        config.services.push(ServiceSettings {
            data_id: "rec-home".to_string(),
            group_id: "DEFAULT_GROUP".to_string(),
            namespace: "public".to_string(),
            model_name: "ctr".to_string(),
            default_model_type: "deepfm".to_string(),
            model_version: Some(2),
            endpoint: "http://127.0.0.1:8501".to_string(),
            redis_url: None,
            user_key_prefix: "user:".to_string(),
            item_key_prefix: "item:".to_string(),
            user_ids_key: "users".to_string(),
            item_ids_key: "items".to_string(),
        });

        crate::create_app_state_with_config(&config).await.unwrap()
    }

    #[tokio::test]
    async fn test_list_services() {
        let Json(response) = list_services(State(state().await)).await;

        assert_eq!(response.services.len(), 1);
        let service = &response.services[0];
        assert_eq!(service.data_id, "rec-home");
        assert_eq!(service.model_name, "ctr");
        assert_eq!(service.default_model_type, "deepfm");
        assert!(!service.subscribed);
    }

    #[tokio::test]
    async fn test_reload_known_service() {
        let Json(response) = reload_service(State(state().await), Path("rec-home".to_string()))
            .await
            .unwrap();

        assert_eq!(response.data_id, "rec-home");
        assert!(response.reloaded);
    }

    #[tokio::test]
    async fn test_reload_unknown_service_is_not_found() {
        let err = reload_service(State(state().await), Path("missing".to_string()))
            .await
            .unwrap_err();

        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
