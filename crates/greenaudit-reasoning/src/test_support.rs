use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use greenaudit_core::document::Chunk;
use greenaudit_core::error::Result;
use greenaudit_core::gateway::{LlmGateway, StructuredResponse, TextRequest, VisionRequest};

type Responder = Box<dyn Fn(&TextRequest) -> String + Send + Sync>;

/// Gateway answering text calls from a closure over the request.
pub struct StubGateway {
    respond: Responder,
    text_calls: AtomicUsize,
}

impl StubGateway {
    pub fn text(respond: impl Fn(&TextRequest) -> String + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            text_calls: AtomicUsize::new(0),
        }
    }

    pub fn text_calls(&self) -> usize {
        self.text_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmGateway for StubGateway {
    async fn call_text(&self, request: TextRequest) -> Result<StructuredResponse> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        let raw = (self.respond)(&request);
        request.schema.parse(&raw)
    }

    async fn call_vision(&self, _request: VisionRequest) -> Result<String> {
        Ok(String::new())
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
