use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::handlers;
use crate::state::AppState;

pub fn create_router() -> Router<AppState> {
    Router::new()
        // Health
        .route("/api/health", get(handlers::health::health_check))
        // Documents
        .route("/api/documents", post(handlers::documents::load_document))
        .route("/api/documents/{id}", delete(handlers::documents::close_document))
        .route("/api/documents/{id}/chunks", get(handlers::documents::list_chunks))
        // Passes
        .route("/api/documents/{id}/analysis", post(handlers::analysis::run_analysis))
        .route(
            "/api/documents/{id}/verification",
            post(handlers::analysis::run_verification),
        )
        // Highlight
        .route("/api/documents/{id}/highlight", get(handlers::highlight::get_highlight))
}
