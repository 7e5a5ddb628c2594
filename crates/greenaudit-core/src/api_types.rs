use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::Chunk;

// --- Health ---

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub documents_loaded: usize,
    pub text_model: String,
    pub vision_model: String,
}

// --- Documents ---

#[derive(Debug, Serialize, Deserialize)]
pub struct LoadDocumentRequest {
    pub path: PathBuf,
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
}

fn default_use_cache() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoadDocumentResponse {
    pub document_id: Uuid,
    pub source: String,
    pub content_address: String,
    pub chunks: Vec<Chunk>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChunkListResponse {
    pub document_id: Uuid,
    pub chunks: Vec<Chunk>,
    pub total: usize,
}

// --- Analysis ---

/// Body of the analysis and verification routes.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PassRequest {
    /// Text model override; the configured default is used when absent.
    #[serde(default)]
    pub model: Option<String>,
}

// --- Highlight ---

#[derive(Debug, Serialize, Deserialize)]
pub struct HighlightQuery {
    pub page: u32,
    pub quote: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HighlightResponse {
    pub image_path: PathBuf,
    pub matched: bool,
}
