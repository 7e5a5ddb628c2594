use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use greenaudit_core::config::{AppConfig, GatewaySettings};
use greenaudit_core::error::{AuditError, Result};
use greenaudit_core::gateway::{LlmGateway, StructuredResponse, TextRequest, VisionRequest};

use crate::retry::with_retry;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// HTTP 529: Anthropic's "overloaded" status.
const STATUS_OVERLOADED: u16 = 529;

// ── Anthropic Messages API request/response types ──────────────────────────

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    source_type: &'static str,
    media_type: &'static str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

// ── Gateway ────────────────────────────────────────────────────────────────

/// [`LlmGateway`] backed by the Anthropic Messages API.
pub struct AnthropicGateway {
    client: reqwest::Client,
    api_key: String,
    settings: GatewaySettings,
}

impl AnthropicGateway {
    /// Fails with [`AuditError::Config`] when no API key is configured.
    pub fn new(config: &AppConfig) -> Result<Self> {
        if config.anthropic_api_key.trim().is_empty() {
            return Err(AuditError::Config(
                "ANTHROPIC_API_KEY is not set; model calls are impossible".into(),
            ));
        }

        let client = reqwest::Client::builder()
            .user_agent("greenaudit/0.1")
            .build()?;

        Ok(Self {
            client,
            api_key: config.anthropic_api_key.clone(),
            settings: config.gateway.clone(),
        })
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// One attempt, bounded by `timeout`. Returns the concatenated text blocks.
    async fn send_once(&self, request: &AnthropicRequest, timeout: Duration) -> Result<String> {
        let call = async {
            let response = self
                .client
                .post(&self.settings.api_url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(request)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<failed to read body>".to_string());
                return Err(classify_status(status, body));
            }

            let api_response: AnthropicResponse = response.json().await.map_err(|e| {
                AuditError::MalformedResponse(format!("failed to decode API envelope: {e}"))
            })?;

            debug!(
                stop_reason = ?api_response.stop_reason,
                blocks = api_response.content.len(),
                "Received Anthropic API response"
            );

            Ok(collect_text(api_response))
        };

        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AuditError::Timeout(timeout.as_secs())),
        }
    }
}

fn classify_status(status: StatusCode, body: String) -> AuditError {
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::SERVICE_UNAVAILABLE
        || status.as_u16() == STATUS_OVERLOADED
    {
        AuditError::RateLimited(format!("{status}: {body}"))
    } else {
        AuditError::GatewayUnavailable(format!("Anthropic API returned {status}: {body}"))
    }
}

fn collect_text(response: AnthropicResponse) -> String {
    response
        .content
        .into_iter()
        .filter(|b| b.block_type == "text")
        .map(|b| b.text)
        .collect::<Vec<_>>()
        .join("")
}

#[async_trait]
impl LlmGateway for AnthropicGateway {
    async fn call_text(&self, request: TextRequest) -> Result<StructuredResponse> {
        let api_request = AnthropicRequest {
            model: request.model.clone(),
            max_tokens: self.settings.text_max_tokens,
            temperature: request.temperature,
            system: Some(request.system_prompt),
            messages: vec![Message {
                role: "user",
                content: vec![ContentPart::Text {
                    text: request.user_prompt,
                }],
            }],
        };

        debug!(
            model = %request.model,
            schema = ?request.schema,
            timeout_secs = request.timeout.as_secs(),
            "Sending text request"
        );

        let start = Instant::now();
        let api_request = &api_request;
        let raw = with_retry(&self.settings, "text call", move || {
            self.send_once(api_request, request.timeout)
        })
        .await?;

        debug!(
            model = %request.model,
            elapsed_ms = start.elapsed().as_millis() as u64,
            response_len = raw.len(),
            "Text call complete"
        );

        request.schema.parse(&raw)
    }

    async fn call_vision(&self, request: VisionRequest) -> Result<String> {
        let data = base64::engine::general_purpose::STANDARD.encode(&request.image);
        let api_request = AnthropicRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            temperature: 0.0,
            system: None,
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentPart::Image {
                        source: ImageSource {
                            source_type: "base64",
                            media_type: "image/png",
                            data,
                        },
                    },
                    ContentPart::Text {
                        text: request.prompt,
                    },
                ],
            }],
        };

        let start = Instant::now();
        let api_request = &api_request;
        let text = with_retry(&self.settings, "vision call", move || {
            self.send_once(api_request, request.timeout)
        })
        .await?;

        info!(
            model = %request.model,
            image_size = request.image.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            text_len = text.len(),
            "Vision description complete"
        );

        Ok(text)
    }
}
