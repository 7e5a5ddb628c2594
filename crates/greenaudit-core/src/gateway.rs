use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::analysis::{ClaimId, ClaimStatus, FindingCategory};
use crate::error::{AuditError, Result};

/// Expected JSON shape of a text call's response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSchema {
    /// `{findings, new_claims, claim_updates}`
    ChunkAnalysis,
    /// `{is_evidence, reason}`
    ClaimVerification,
}

#[derive(Debug, Clone)]
pub struct TextRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub schema: ResponseSchema,
    pub temperature: f32,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub model: String,
    /// PNG bytes of the rendered page.
    pub image: Vec<u8>,
    pub prompt: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FindingDraft {
    pub category: FindingCategory,
    pub quote: String,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClaimDraft {
    pub claim: String,
    #[serde(default)]
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClaimUpdate {
    pub id: ClaimId,
    pub status: ClaimStatus,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChunkAnalysis {
    #[serde(default)]
    pub findings: Vec<FindingDraft>,
    #[serde(default)]
    pub new_claims: Vec<ClaimDraft>,
    #[serde(default)]
    pub claim_updates: Vec<ClaimUpdate>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VerificationVerdict {
    pub is_evidence: bool,
    #[serde(default)]
    pub reason: String,
}

/// A text response that has passed validation against its [`ResponseSchema`].
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredResponse {
    ChunkAnalysis(ChunkAnalysis),
    ClaimVerification(VerificationVerdict),
}

impl StructuredResponse {
    pub fn into_chunk_analysis(self) -> Result<ChunkAnalysis> {
        match self {
            StructuredResponse::ChunkAnalysis(a) => Ok(a),
            other => Err(AuditError::MalformedResponse(format!(
                "expected chunk analysis, got {other:?}"
            ))),
        }
    }

    pub fn into_verdict(self) -> Result<VerificationVerdict> {
        match self {
            StructuredResponse::ClaimVerification(v) => Ok(v),
            other => Err(AuditError::MalformedResponse(format!(
                "expected verification verdict, got {other:?}"
            ))),
        }
    }
}

impl ResponseSchema {
    /// Decode raw model output into the typed payload for this schema.
    pub fn parse(&self, raw: &str) -> Result<StructuredResponse> {
        let cleaned = strip_code_fences(raw);
        if cleaned.is_empty() {
            return Err(AuditError::MalformedResponse("empty response".into()));
        }

        let malformed = |e: serde_json::Error| {
            tracing::debug!(schema = ?self, error = %e, "response failed schema validation");
            AuditError::MalformedResponse(format!("{self:?}: {e}"))
        };

        match self {
            ResponseSchema::ChunkAnalysis => serde_json::from_str::<ChunkAnalysis>(cleaned)
                .map(StructuredResponse::ChunkAnalysis)
                .map_err(malformed),
            ResponseSchema::ClaimVerification => {
                serde_json::from_str::<VerificationVerdict>(cleaned)
                    .map(StructuredResponse::ClaimVerification)
                    .map_err(malformed)
            }
        }
    }
}

/// Strip markdown fences a model may wrap around JSON despite instructions.
fn strip_code_fences(raw: &str) -> &str {
    let cleaned = raw.trim();
    if cleaned.starts_with("```") {
        let start = cleaned.find('{').unwrap_or(0);
        let end = cleaned.rfind('}').map(|i| i + 1).unwrap_or(cleaned.len());
        if start < end {
            return &cleaned[start..end];
        }
    }
    cleaned
}

/// Uniform access to the text and vision model services.
///
/// Implementations own retry, backoff and timeout policy; callers see either
/// a validated response or a terminal error.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn call_text(&self, request: TextRequest) -> Result<StructuredResponse>;

    async fn call_vision(&self, request: VisionRequest) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chunk_analysis() {
        let raw = r#"{
            "findings": [{"category": "VAGUE", "quote": "eco-friendly", "reasoning": "no metric"}],
            "new_claims": [{"claim": "Net zero by 2040", "context": "Strategy"}],
            "claim_updates": [{"id": 1, "status": "POTENTIALLY_VERIFIED", "reason": "table"}]
        }"#;
        let parsed = ResponseSchema::ChunkAnalysis
            .parse(raw)
            .unwrap()
            .into_chunk_analysis()
            .unwrap();
        assert_eq!(parsed.findings.len(), 1);
        assert_eq!(parsed.findings[0].category, FindingCategory::Vague);
        assert_eq!(parsed.new_claims[0].claim, "Net zero by 2040");
        assert_eq!(parsed.claim_updates[0].status, ClaimStatus::PotentiallyVerified);
    }

    #[test]
    fn missing_lists_default_to_empty() {
        let parsed = ResponseSchema::ChunkAnalysis
            .parse(r#"{"findings": []}"#)
            .unwrap()
            .into_chunk_analysis()
            .unwrap();
        assert!(parsed.new_claims.is_empty());
        assert!(parsed.claim_updates.is_empty());
    }

    #[test]
    fn unknown_category_is_malformed() {
        let raw = r#"{"findings": [{"category": "GREEN", "quote": "x", "reasoning": "y"}]}"#;
        let err = ResponseSchema::ChunkAnalysis.parse(raw).unwrap_err();
        assert!(matches!(err, AuditError::MalformedResponse(_)));
    }

    #[test]
    fn unexpected_top_level_key_is_malformed() {
        let err = ResponseSchema::ChunkAnalysis
            .parse(r#"{"entities": []}"#)
            .unwrap_err();
        assert!(matches!(err, AuditError::MalformedResponse(_)));
    }

    #[test]
    fn code_fences_are_stripped() {
        let raw = "```json\n{\"is_evidence\": true, \"reason\": \"audited figures\"}\n```";
        let verdict = ResponseSchema::ClaimVerification
            .parse(raw)
            .unwrap()
            .into_verdict()
            .unwrap();
        assert!(verdict.is_evidence);
        assert_eq!(verdict.reason, "audited figures");
    }

    #[test]
    fn verdict_requires_boolean() {
        let err = ResponseSchema::ClaimVerification
            .parse(r#"{"is_evidence": "yes"}"#)
            .unwrap_err();
        assert!(matches!(err, AuditError::MalformedResponse(_)));
    }

    #[test]
    fn prose_is_malformed() {
        assert!(ResponseSchema::ChunkAnalysis.parse("I could not find anything.").is_err());
        assert!(ResponseSchema::ChunkAnalysis.parse("   ").is_err());
    }

    #[test]
    fn wrong_variant_conversion_fails() {
        let response = StructuredResponse::ClaimVerification(VerificationVerdict {
            is_evidence: false,
            reason: String::new(),
        });
        assert!(response.into_chunk_analysis().is_err());
    }
}
