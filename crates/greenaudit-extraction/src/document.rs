use std::path::Path;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use greenaudit_core::error::Result;

/// A source document held in memory, addressed by the hash of its bytes.
#[derive(Debug, Clone)]
pub struct Document {
    pub content_address: String,
    /// File name the document was loaded from.
    pub source: String,
    bytes: Arc<Vec<u8>>,
}

impl Document {
    pub fn from_bytes(source: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            content_address: content_address(&bytes),
            source: source.into(),
            bytes: Arc::new(bytes),
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::from_bytes(source, bytes))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn shared_bytes(&self) -> Arc<Vec<u8>> {
        Arc::clone(&self.bytes)
    }
}

/// Hex SHA-256 of the document bytes; the cache key.
pub fn content_address(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_depends_only_on_content() {
        let a = Document::from_bytes("a.pdf", b"%PDF-1.7 report".to_vec());
        let b = Document::from_bytes("renamed.pdf", b"%PDF-1.7 report".to_vec());
        let c = Document::from_bytes("a.pdf", b"%PDF-1.7 other".to_vec());
        assert_eq!(a.content_address, b.content_address);
        assert_ne!(a.content_address, c.content_address);
        assert_eq!(a.content_address.len(), 64);
    }

    #[tokio::test]
    async fn from_path_uses_file_name_as_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("csr_2023.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        let doc = Document::from_path(&path).await.unwrap();
        assert_eq!(doc.source, "csr_2023.pdf");
        assert_eq!(doc.bytes(), b"%PDF-1.4");
    }
}
