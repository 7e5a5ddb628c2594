//! Shared doubles for the cross-crate scenario tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use greenaudit_core::config::{ExtractionSettings, GatewaySettings};
use greenaudit_core::document::Chunk;
use greenaudit_core::error::Result;
use greenaudit_core::gateway::{LlmGateway, StructuredResponse, TextRequest, VisionRequest};
use greenaudit_extraction::vision::NO_RELEVANT_DATA;
use greenaudit_extraction::{Document, DocumentLoader, InMemoryPageSource};

type TextScript = Box<dyn Fn(&TextRequest) -> Result<String> + Send + Sync>;
type VisionScript = Box<dyn Fn(&VisionRequest) -> Result<String> + Send + Sync>;

/// Gateway double answering from closures and recording every call.
///
/// Text replies go through the same schema validation as the real gateway.
pub struct ScriptedGateway {
    text: TextScript,
    vision: VisionScript,
    vision_delay: Duration,
    text_requests: Mutex<Vec<TextRequest>>,
    vision_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self {
            text: Box::new(|_| Ok("{}".to_string())),
            vision: Box::new(|_| Ok(NO_RELEVANT_DATA.to_string())),
            vision_delay: Duration::ZERO,
            text_requests: Mutex::new(Vec::new()),
            vision_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(
        mut self,
        script: impl Fn(&TextRequest) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        self.text = Box::new(script);
        self
    }

    pub fn with_vision(
        mut self,
        script: impl Fn(&VisionRequest) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        self.vision = Box::new(script);
        self
    }

    pub fn with_vision_delay(mut self, delay: Duration) -> Self {
        self.vision_delay = delay;
        self
    }

    pub fn text_requests(&self) -> Vec<TextRequest> {
        self.text_requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn text_calls(&self) -> usize {
        self.text_requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn vision_calls(&self) -> usize {
        self.vision_calls.load(Ordering::SeqCst)
    }

    /// Highest number of vision calls observed running at once.
    pub fn max_vision_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmGateway for ScriptedGateway {
    async fn call_text(&self, request: TextRequest) -> Result<StructuredResponse> {
        self.text_requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        let raw = (self.text)(&request)?;
        request.schema.parse(&raw)
    }

    async fn call_vision(&self, request: VisionRequest) -> Result<String> {
        self.vision_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.vision_delay.is_zero() {
            tokio::time::sleep(self.vision_delay).await;
        }
        let result = (self.vision)(&request);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// One chunk per text, pages numbered from 1.
pub fn chunks(texts: &[&str]) -> Vec<Chunk> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let page = i as u32 + 1;
            Chunk::new(
                page,
                "report.pdf",
                text.to_string(),
                PathBuf::from(format!("page_{page}.png")),
            )
        })
        .collect()
}

/// A document whose pages render from `pages`, and a loader caching under
/// `cache_dir`.
pub fn in_memory_loader(
    gateway: Arc<ScriptedGateway>,
    pages: &[&str],
    cache_dir: &Path,
    settings: ExtractionSettings,
) -> (DocumentLoader, Document) {
    let document = Document::from_bytes("report.pdf", pages.join("\u{c}").into_bytes());
    let loader = DocumentLoader::new(
        gateway,
        Arc::new(InMemoryPageSource::new(pages.iter().copied())),
        ExtractionSettings {
            cache_dir: cache_dir.to_path_buf(),
            ..settings
        },
        &GatewaySettings::default(),
    );
    (loader, document)
}
