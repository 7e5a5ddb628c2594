use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An external model call exhausted its retries.
    #[error("Gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// A model response failed schema validation.
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Timed out after {0}s")]
    Timeout(u64),

    #[error("Invalid image path: {}", .0.display())]
    InvalidImagePath(PathBuf),

    #[error("PDF rendering failed on page {page}: {reason}")]
    PdfRendering { page: usize, reason: String },

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuditError {
    /// Whether the gateway should retry the call that produced this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuditError::RateLimited(_) | AuditError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, AuditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_rate_limits_and_timeouts_are_retryable() {
        assert!(AuditError::RateLimited("429".into()).is_retryable());
        assert!(AuditError::Timeout(30).is_retryable());
        assert!(!AuditError::MalformedResponse("bad".into()).is_retryable());
        assert!(!AuditError::GatewayUnavailable("gone".into()).is_retryable());
        assert!(!AuditError::Config("no key".into()).is_retryable());
    }

    #[test]
    fn invalid_image_path_mentions_path() {
        let err = AuditError::InvalidImagePath(PathBuf::from("/tmp/missing/page_3.png"));
        assert!(err.to_string().contains("page_3.png"));
    }
}
