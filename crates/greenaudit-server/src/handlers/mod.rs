pub mod analysis;
pub mod documents;
pub mod health;
pub mod highlight;

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};

use greenaudit_core::AuditError;

/// HTTP status for a core error surfaced at the boundary.
pub fn status_for(error: &AuditError) -> StatusCode {
    match error {
        AuditError::NotFound(_) | AuditError::InvalidImagePath(_) => StatusCode::NOT_FOUND,
        AuditError::PdfRendering { .. } | AuditError::ImageProcessing(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        AuditError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
        AuditError::GatewayUnavailable(_) | AuditError::RateLimited(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        AuditError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}

pub fn audit_error_response(context: &str, error: &AuditError) -> Response {
    error_response(status_for(error), format!("{context}: {error}"))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn missing_images_map_to_not_found() {
        let err = AuditError::InvalidImagePath(PathBuf::from("cache/x/images/page_9.png"));
        assert_eq!(status_for(&err), StatusCode::NOT_FOUND);
    }

    #[test]
    fn gateway_failures_map_to_unavailable() {
        assert_eq!(
            status_for(&AuditError::GatewayUnavailable("down".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(status_for(&AuditError::Timeout(30)), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            status_for(&AuditError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
