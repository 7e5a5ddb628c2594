use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use greenaudit_core::config::{ExtractionSettings, GatewaySettings};
use greenaudit_core::document::{Chunk, PageLayout, PageSource, RenderedPage};
use greenaudit_core::error::{AuditError, Result};
use greenaudit_core::gateway::{LlmGateway, VisionRequest};
use greenaudit_core::progress::{NoProgress, ProgressObserver};

use crate::cache::{CachedDocument, DocumentCache};
use crate::document::Document;
use crate::highlight::{locate_quote, render_highlight, QuoteMatch};
use crate::vision::{merge_page_text, normalize_description, VISION_PROMPT};

/// Image returned for a highlight request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub image_path: PathBuf,
    /// `false` when the quote could not be placed and the plain page is returned.
    pub matched: bool,
}

/// Turns a document into ordered page chunks (layout text + vision description).
pub struct DocumentLoader {
    gateway: Arc<dyn LlmGateway>,
    pages: Arc<dyn PageSource>,
    cache: DocumentCache,
    settings: ExtractionSettings,
    vision_model: String,
    vision_max_tokens: u32,
    vision_timeout: Duration,
}

impl DocumentLoader {
    pub fn new(
        gateway: Arc<dyn LlmGateway>,
        pages: Arc<dyn PageSource>,
        settings: ExtractionSettings,
        gateway_settings: &GatewaySettings,
    ) -> Self {
        Self {
            gateway,
            pages,
            cache: DocumentCache::new(settings.cache_dir.clone()),
            settings,
            vision_model: gateway_settings.vision_model.clone(),
            vision_max_tokens: gateway_settings.vision_max_tokens,
            vision_timeout: gateway_settings.vision_timeout(),
        }
    }

    pub fn cache(&self) -> &DocumentCache {
        &self.cache
    }

    pub async fn load(&self, document: &Document, use_cache: bool) -> Result<Vec<Chunk>> {
        self.load_with_progress(document, use_cache, &NoProgress).await
    }

    /// Load `document`, serving a committed cache entry without any external
    /// call when `use_cache` is set.
    #[instrument(skip(self, document, progress), fields(source = %document.source, address = %document.content_address))]
    pub async fn load_with_progress(
        &self,
        document: &Document,
        use_cache: bool,
        progress: &dyn ProgressObserver,
    ) -> Result<Vec<Chunk>> {
        let address = document.content_address.as_str();

        if use_cache {
            if let Some(cached) = self.cache.read(address).await {
                info!(chunks = cached.chunks.len(), "Loaded document from cache");
                progress.on_progress(1.0, "Loaded from cache");
                return Ok(cached.chunks);
            }
        }

        let rendered = self.render_pages(document).await?;
        let total = rendered.len();
        progress.on_progress(0.1, &format!("Rendered {total} pages"));

        let mut image_paths = Vec::with_capacity(total);
        let mut layouts = Vec::with_capacity(total);
        for (index, page) in rendered.iter().enumerate() {
            let page_no = page_number(index);
            image_paths.push(self.cache.write_page_image(address, page_no, &page.png).await?);
            layouts.push(PageLayout {
                page: page_no,
                width: page.width,
                height: page.height,
                spans: page.spans.clone(),
            });
        }

        let descriptions = self.describe_pages(&rendered, progress).await;

        let chunks: Vec<Chunk> = rendered
            .iter()
            .zip(descriptions)
            .zip(image_paths)
            .enumerate()
            .map(|(index, ((page, description), image_path))| {
                Chunk::new(
                    page_number(index),
                    document.source.clone(),
                    merge_page_text(&page.layout_text, &description),
                    image_path,
                )
            })
            .collect();

        self.cache
            .commit(&CachedDocument {
                content_address: address.to_string(),
                source: document.source.clone(),
                created_at: Utc::now(),
                chunks: chunks.clone(),
                layouts,
            })
            .await?;

        progress.on_progress(1.0, "Extraction complete");
        info!(chunks = chunks.len(), "Document extraction complete");
        Ok(chunks)
    }

    /// Render every page (up to the page limit) on the blocking pool.
    async fn render_pages(&self, document: &Document) -> Result<Vec<RenderedPage>> {
        let pages = Arc::clone(&self.pages);
        let bytes = document.shared_bytes();
        let max_pages = self.settings.max_pages;
        let dpi = self.settings.render_dpi;

        tokio::task::spawn_blocking(move || {
            let count = pages.page_count(&bytes)?;
            let limit = max_pages.map_or(count, |max| count.min(max));
            debug!(page_count = count, limit, "Rendering pages");
            (0..limit)
                .map(|index| pages.render_page(&bytes, index, dpi))
                .collect::<Result<Vec<_>>>()
        })
        .await
        .map_err(|e| AuditError::Internal(format!("render task failed: {e}")))?
    }

    /// Vision descriptions in page order, at most `vision_workers` in flight.
    /// A page whose call fails gets an empty description.
    async fn describe_pages(
        &self,
        rendered: &[RenderedPage],
        progress: &dyn ProgressObserver,
    ) -> Vec<String> {
        let total = rendered.len();
        let workers = self.settings.vision_workers.max(1);
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut join_set = JoinSet::new();

        for (index, page) in rendered.iter().enumerate() {
            let gateway = Arc::clone(&self.gateway);
            let semaphore = Arc::clone(&semaphore);
            let request = VisionRequest {
                model: self.vision_model.clone(),
                image: page.png.clone(),
                prompt: VISION_PROMPT.to_string(),
                max_tokens: self.vision_max_tokens,
                timeout: self.vision_timeout,
            };

            join_set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return (index, Err(AuditError::Internal(e.to_string()))),
                };
                (index, gateway.call_vision(request).await)
            });
        }

        let mut descriptions = vec![String::new(); total];
        let mut completed = 0usize;

        while let Some(joined) = join_set.join_next().await {
            completed += 1;
            match joined {
                Ok((index, Ok(raw))) => {
                    descriptions[index] = normalize_description(&raw);
                    debug!(page = page_number(index), len = descriptions[index].len(), "Vision description received");
                }
                Ok((index, Err(e))) => {
                    warn!(
                        page = page_number(index),
                        error = %e,
                        "Vision description failed, continuing with layout text only"
                    );
                }
                Err(join_err) => {
                    warn!(error = %join_err, "Vision task panicked");
                }
            }
            let fraction = 0.1 + 0.9 * completed as f32 / total.max(1) as f32;
            progress.on_progress(fraction, &format!("Vision {completed}/{total}"));
        }

        descriptions
    }

    /// Find `quote` on the cached image of `page`.
    pub async fn locate(&self, document: &Document, page: u32, quote: &str) -> Result<QuoteMatch> {
        let image_path = self.cache.page_image_path(&document.content_address, page);
        if !tokio::fs::try_exists(&image_path).await.unwrap_or(false) {
            return Err(AuditError::InvalidImagePath(image_path));
        }

        let Some(layout) = self.cache.layout(&document.content_address, page).await else {
            return Ok(QuoteMatch::Unmatched);
        };
        Ok(locate_quote(&layout.spans, quote))
    }

    /// Page image with `quote` marked; the unmarked page when the quote cannot
    /// be placed. Results are cached per page and quote.
    pub async fn highlighted_image(
        &self,
        document: &Document,
        page: u32,
        quote: &str,
    ) -> Result<Highlight> {
        let address = document.content_address.as_str();
        let original = self.cache.page_image_path(address, page);
        let target = self.cache.highlight_path(address, page, quote);

        if !tokio::fs::try_exists(&original).await.unwrap_or(false) {
            return Err(AuditError::InvalidImagePath(original));
        }
        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            return Ok(Highlight {
                image_path: target,
                matched: true,
            });
        }

        match self.locate(document, page, quote).await? {
            QuoteMatch::Matched(region) => {
                self.cache.ensure_highlights_dir(address).await?;
                let (source, dest) = (original.clone(), target.clone());
                tokio::task::spawn_blocking(move || render_highlight(&source, &dest, region))
                    .await
                    .map_err(|e| AuditError::Internal(format!("highlight task failed: {e}")))??;
                debug!(page, path = %target.display(), "Rendered highlight");
                Ok(Highlight {
                    image_path: target,
                    matched: true,
                })
            }
            QuoteMatch::Unmatched => {
                warn!(page, quote = %quote, "Quote not found on page, returning plain image");
                Ok(Highlight {
                    image_path: original,
                    matched: false,
                })
            }
        }
    }
}

fn page_number(index: usize) -> u32 {
    index as u32 + 1
}
