//! Versioned scoring API

pub mod recommend;

use axum::{routing::post, Router};

use super::state::AppState;

pub fn create_v1_router() -> Router<AppState> {
    Router::new().route("/recommend", post(recommend::recommend))
}
