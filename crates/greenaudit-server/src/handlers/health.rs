use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::info;

use greenaudit_core::api_types::HealthResponse;

use crate::state::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    info!("Health check requested");

    let documents_loaded = state.sessions.read().await.len();
    let response = HealthResponse {
        status: "ok".to_string(),
        version: VERSION.to_string(),
        documents_loaded,
        text_model: state.config.gateway.text_model.clone(),
        vision_model: state.config.gateway.vision_model.clone(),
    };

    (StatusCode::OK, Json(response))
}
