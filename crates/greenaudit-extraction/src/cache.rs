use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use greenaudit_core::document::{Chunk, PageLayout};
use greenaudit_core::error::{AuditError, Result};

const MANIFEST_FILE: &str = "chunks.json";
const MANIFEST_PREFIX: &str = ".chunks.";
const PAGE_PREFIX: &str = ".page.";
const PARTIAL_SUFFIX: &str = ".partial";
const IMAGES_DIR: &str = "images";
const HIGHLIGHTS_DIR: &str = "highlights";

/// Everything persisted for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedDocument {
    pub content_address: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub chunks: Vec<Chunk>,
    #[serde(default)]
    pub layouts: Vec<PageLayout>,
}

/// Content-addressed on-disk cache.
///
/// Layout per document: `<root>/<address>/chunks.json`, `images/page_<n>.png`
/// and `highlights/p<n>_<hash8>.png`. Files are written to a uniquely named
/// sibling and renamed into place, manifest last, so a reader never sees a
/// half-written entry and concurrent writers of one entry do not collide.
#[derive(Debug, Clone)]
pub struct DocumentCache {
    root: PathBuf,
}

impl DocumentCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn entry_dir(&self, address: &str) -> PathBuf {
        self.root.join(address)
    }

    pub fn page_image_path(&self, address: &str, page: u32) -> PathBuf {
        self.entry_dir(address)
            .join(IMAGES_DIR)
            .join(format!("page_{page}.png"))
    }

    pub fn highlight_path(&self, address: &str, page: u32, quote: &str) -> PathBuf {
        self.entry_dir(address)
            .join(HIGHLIGHTS_DIR)
            .join(format!("p{page}_{}.png", quote_hash(quote)))
    }

    fn manifest_path(&self, address: &str) -> PathBuf {
        self.entry_dir(address).join(MANIFEST_FILE)
    }

    /// Read a committed entry. A missing or unreadable manifest is a miss.
    pub async fn read(&self, address: &str) -> Option<CachedDocument> {
        let path = self.manifest_path(address);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(_) => return None,
        };

        match serde_json::from_slice::<CachedDocument>(&raw) {
            Ok(doc) if doc.content_address == address => Some(doc),
            Ok(doc) => {
                warn!(
                    expected = %address,
                    found = %doc.content_address,
                    "Cache manifest belongs to a different document, ignoring"
                );
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupt cache manifest, ignoring");
                None
            }
        }
    }

    pub async fn write_page_image(&self, address: &str, page: u32, png: &[u8]) -> Result<PathBuf> {
        let path = self.page_image_path(address, page);
        let dir = self.entry_dir(address).join(IMAGES_DIR);
        tokio::fs::create_dir_all(&dir).await?;
        publish(dir, path.clone(), png.to_vec(), PAGE_PREFIX).await?;
        Ok(path)
    }

    pub async fn ensure_highlights_dir(&self, address: &str) -> Result<PathBuf> {
        let dir = self.entry_dir(address).join(HIGHLIGHTS_DIR);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Atomically publish the manifest for `doc`.
    pub async fn commit(&self, doc: &CachedDocument) -> Result<()> {
        let dir = self.entry_dir(&doc.content_address);
        tokio::fs::create_dir_all(&dir).await?;

        let json = serde_json::to_vec_pretty(doc)?;
        let bytes = json.len();
        publish(dir.clone(), dir.join(MANIFEST_FILE), json, MANIFEST_PREFIX).await?;

        debug!(
            address = %doc.content_address,
            chunks = doc.chunks.len(),
            bytes,
            "Cache entry committed"
        );
        Ok(())
    }

    pub async fn layout(&self, address: &str, page: u32) -> Option<PageLayout> {
        self.read(address)
            .await?
            .layouts
            .into_iter()
            .find(|l| l.page == page)
    }
}

/// Write `bytes` to a fresh temp file in `dir`, then rename it over `dest`.
async fn publish(dir: PathBuf, dest: PathBuf, bytes: Vec<u8>, prefix: &'static str) -> Result<()> {
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut partial = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(PARTIAL_SUFFIX)
            .tempfile_in(&dir)?;
        partial.write_all(&bytes)?;
        partial.as_file().sync_all()?;
        partial.persist(&dest).map_err(|e| {
            AuditError::Cache(format!("failed to publish {}: {}", dest.display(), e.error))
        })?;
        Ok(())
    })
    .await
    .map_err(|e| AuditError::Internal(format!("cache write task failed: {e}")))?
}

/// First 8 hex chars of the quote's SHA-256.
pub fn quote_hash(quote: &str) -> String {
    let digest = hex::encode(Sha256::digest(quote.as_bytes()));
    digest[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(address: &str) -> CachedDocument {
        CachedDocument {
            content_address: address.to_string(),
            source: "report.pdf".into(),
            created_at: Utc::now(),
            chunks: vec![Chunk::new(1, "report.pdf", "Scope 1 emissions".into(), PathBuf::from("p1.png"))],
            layouts: vec![PageLayout {
                page: 1,
                width: 100,
                height: 100,
                spans: Vec::new(),
            }],
        }
    }

    #[tokio::test]
    async fn commit_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DocumentCache::new(dir.path());

        assert!(cache.read("abc").await.is_none());
        cache.commit(&sample("abc")).await.unwrap();

        let doc = cache.read("abc").await.unwrap();
        assert_eq!(doc.chunks.len(), 1);
        assert_eq!(doc.chunks[0].text, "Scope 1 emissions");
        assert!(leftover_partials(&cache.entry_dir("abc")).is_empty());
    }

    fn leftover_partials(dir: &std::path::Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(PARTIAL_SUFFIX))
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_commits_of_one_entry_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DocumentCache::new(dir.path());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.write_page_image("abc", 1, b"png bytes").await?;
                cache.commit(&sample("abc")).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(cache.read("abc").await.unwrap().chunks.len(), 1);
        assert_eq!(std::fs::read(cache.page_image_path("abc", 1)).unwrap(), b"png bytes");
        assert!(leftover_partials(&cache.entry_dir("abc")).is_empty());
        assert!(leftover_partials(&cache.entry_dir("abc").join(IMAGES_DIR)).is_empty());
    }

    #[tokio::test]
    async fn partial_manifest_is_not_readable() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DocumentCache::new(dir.path());
        let entry = cache.entry_dir("abc");
        std::fs::create_dir_all(&entry).unwrap();
        std::fs::write(
            entry.join(format!("{MANIFEST_PREFIX}a1b2c3{PARTIAL_SUFFIX}")),
            b"{\"content_address\":",
        )
        .unwrap();

        assert!(cache.read("abc").await.is_none());
    }

    #[tokio::test]
    async fn corrupt_manifest_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DocumentCache::new(dir.path());
        let entry = cache.entry_dir("abc");
        std::fs::create_dir_all(&entry).unwrap();
        std::fs::write(entry.join(MANIFEST_FILE), b"not json").unwrap();

        assert!(cache.read("abc").await.is_none());
    }

    #[tokio::test]
    async fn layout_lookup_by_page() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DocumentCache::new(dir.path());
        cache.commit(&sample("abc")).await.unwrap();

        assert!(cache.layout("abc", 1).await.is_some());
        assert!(cache.layout("abc", 2).await.is_none());
    }

    #[test]
    fn highlight_names_use_page_and_quote_hash() {
        let cache = DocumentCache::new("/cache");
        let path = cache.highlight_path("abc", 3, "net zero by 2040");
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("p3_"));
        assert_eq!(name.len(), "p3_".len() + 8 + ".png".len());
        assert_eq!(quote_hash("x"), quote_hash("x"));
        assert_ne!(quote_hash("x"), quote_hash("y"));
    }
}
