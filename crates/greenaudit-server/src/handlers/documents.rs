use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::{error, info, instrument};
use uuid::Uuid;

use greenaudit_core::api_types::{ChunkListResponse, LoadDocumentRequest, LoadDocumentResponse};
use greenaudit_extraction::Document;

use super::{audit_error_response, error_response};
use crate::state::{close_session, AppState, DocumentSession};

#[instrument(skip(state, request), fields(path = %request.path.display(), use_cache = request.use_cache))]
pub async fn load_document(
    State(state): State<AppState>,
    Json(request): Json<LoadDocumentRequest>,
) -> impl IntoResponse {
    let document = match Document::from_path(&request.path).await {
        Ok(document) => document,
        Err(e) => {
            error!(error = %e, "Failed to read document");
            return audit_error_response("Failed to read document", &e);
        }
    };

    let chunks = match state.loader.load(&document, request.use_cache).await {
        Ok(chunks) => chunks,
        Err(e) => {
            error!(error = %e, "Document extraction failed");
            return audit_error_response("Extraction failed", &e);
        }
    };

    let document_id = Uuid::new_v4();
    let response = LoadDocumentResponse {
        document_id,
        source: document.source.clone(),
        content_address: document.content_address.clone(),
        chunks: chunks.clone(),
    };

    state
        .sessions
        .write()
        .await
        .insert(document_id, DocumentSession::new(document, chunks));

    info!(%document_id, chunks = response.chunks.len(), "Document loaded");
    (StatusCode::OK, Json(response)).into_response()
}

pub async fn list_chunks(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let sessions = state.sessions.read().await;
    match sessions.get(&id) {
        Some(session) => {
            let response = ChunkListResponse {
                document_id: id,
                chunks: session.chunks.clone(),
                total: session.chunks.len(),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        None => error_response(StatusCode::NOT_FOUND, format!("Document {id} not found")),
    }
}

pub async fn close_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match close_session(&state.sessions, id).await {
        Some(_) => {
            info!(document_id = %id, "Document closed");
            StatusCode::NO_CONTENT.into_response()
        }
        None => error_response(StatusCode::NOT_FOUND, format!("Document {id} not found")),
    }
}
