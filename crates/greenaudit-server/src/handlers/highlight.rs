use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::{error, instrument};
use uuid::Uuid;

use greenaudit_core::api_types::{HighlightQuery, HighlightResponse};

use super::{audit_error_response, error_response};
use crate::state::AppState;

#[instrument(skip(state, query), fields(document_id = %id, page = query.page))]
pub async fn get_highlight(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<HighlightQuery>,
) -> impl IntoResponse {
    let Some(document) = state
        .sessions
        .read()
        .await
        .get(&id)
        .map(|s| s.document.clone())
    else {
        return error_response(StatusCode::NOT_FOUND, format!("Document {id} not found"));
    };

    match state
        .loader
        .highlighted_image(&document, query.page, &query.quote)
        .await
    {
        Ok(highlight) => {
            let response = HighlightResponse {
                image_path: highlight.image_path,
                matched: highlight.matched,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            error!(error = %e, "Highlight failed");
            audit_error_response("Highlight failed", &e)
        }
    }
}
