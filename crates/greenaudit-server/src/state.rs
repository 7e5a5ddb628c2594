use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use greenaudit_core::analysis::{AnalysisReport, VerificationReport};
use greenaudit_core::document::Chunk;
use greenaudit_core::AppConfig;
use greenaudit_extraction::{Document, DocumentLoader};
use greenaudit_reasoning::{AnalysisEngine, VerificationEngine};

/// A loaded document and the results computed for it so far.
pub struct DocumentSession {
    pub document: Document,
    pub chunks: Vec<Chunk>,
    pub analysis: Option<AnalysisReport>,
    pub verification: Option<VerificationReport>,
}

impl DocumentSession {
    pub fn new(document: Document, chunks: Vec<Chunk>) -> Self {
        Self {
            document,
            chunks,
            analysis: None,
            verification: None,
        }
    }
}

/// Loaded documents by id. Entries live until closed.
pub type Sessions = Arc<RwLock<HashMap<Uuid, DocumentSession>>>;

/// Drop the session for `id`, releasing its document bytes and results.
pub async fn close_session(sessions: &Sessions, id: Uuid) -> Option<DocumentSession> {
    sessions.write().await.remove(&id)
}

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub loader: Arc<DocumentLoader>,
    pub analysis: Arc<AnalysisEngine>,
    pub verification: Arc<VerificationEngine>,
    pub sessions: Sessions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closed_sessions_are_removed_once() {
        let sessions: Sessions = Arc::new(RwLock::new(HashMap::new()));
        let id = Uuid::new_v4();
        let document = Document::from_bytes("report.pdf", b"%PDF-1.7 report".to_vec());
        sessions
            .write()
            .await
            .insert(id, DocumentSession::new(document, Vec::new()));

        let closed = close_session(&sessions, id).await.unwrap();
        assert_eq!(closed.document.source, "report.pdf");
        assert!(sessions.read().await.is_empty());
        assert!(close_session(&sessions, id).await.is_none());
    }
}
