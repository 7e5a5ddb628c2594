use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::{info, instrument};
use uuid::Uuid;

use greenaudit_core::api_types::PassRequest;

use super::error_response;
use crate::state::AppState;

#[instrument(skip(state, request), fields(document_id = %id))]
pub async fn run_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    request: Option<Json<PassRequest>>,
) -> impl IntoResponse {
    let Some(chunks) = state
        .sessions
        .read()
        .await
        .get(&id)
        .map(|s| s.chunks.clone())
    else {
        return error_response(StatusCode::NOT_FOUND, format!("Document {id} not found"));
    };

    let model = request
        .and_then(|Json(r)| r.model)
        .unwrap_or_else(|| state.config.gateway.text_model.clone());

    let report = state.analysis.analyze(&chunks, &model).await;
    info!(
        findings = report.findings.len(),
        claims = report.claims.len(),
        partial = report.is_partial(),
        "Analysis finished"
    );

    if let Some(session) = state.sessions.write().await.get_mut(&id) {
        session.analysis = Some(report.clone());
        session.verification = None;
    }

    (StatusCode::OK, Json(report)).into_response()
}

#[instrument(skip(state, request), fields(document_id = %id))]
pub async fn run_verification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    request: Option<Json<PassRequest>>,
) -> impl IntoResponse {
    let (chunks, claims) = {
        let sessions = state.sessions.read().await;
        let Some(session) = sessions.get(&id) else {
            return error_response(StatusCode::NOT_FOUND, format!("Document {id} not found"));
        };
        let Some(analysis) = session.analysis.as_ref() else {
            return error_response(
                StatusCode::CONFLICT,
                "Run the analysis before verification",
            );
        };
        (session.chunks.clone(), analysis.claims.clone())
    };

    let model = request
        .and_then(|Json(r)| r.model)
        .unwrap_or_else(|| state.config.gateway.text_model.clone());

    let report = state.verification.verify(&chunks, claims, &model).await;
    info!(
        verified = report.verified_count,
        calls = report.calls_made,
        "Verification finished"
    );

    if let Some(session) = state.sessions.write().await.get_mut(&id) {
        if let Some(analysis) = session.analysis.as_mut() {
            analysis.claims = report.claims.clone();
        }
        session.verification = Some(report.clone());
    }

    (StatusCode::OK, Json(report)).into_response()
}
