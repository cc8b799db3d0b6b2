//! Admin endpoints for service configuration

pub mod services;

use axum::{
    routing::{get, post},
    Router,
};

use super::state::AppState;

pub fn create_admin_router() -> Router<AppState> {
    Router::new()
        .route("/services", get(services::list_services))
        .route("/services/{data_id}/reload", post(services::reload_service))
}
