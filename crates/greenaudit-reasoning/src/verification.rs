use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use greenaudit_core::analysis::{
    AnalysisWarning, Claim, ClaimId, ClaimMemory, Evidence, EvidenceSource, UpdateOutcome,
    VerificationReport,
};
use greenaudit_core::config::{GatewaySettings, VerificationSettings};
use greenaudit_core::document::Chunk;
use greenaudit_core::error::AuditError;
use greenaudit_core::gateway::{LlmGateway, ResponseSchema, StructuredResponse, TextRequest};
use greenaudit_core::progress::{NoProgress, ProgressObserver};

use crate::keywords::{keyword_overlap, significant_keywords};
use crate::prompts::{verification_user_prompt, VERIFICATION_SYSTEM_PROMPT};

/// Pass 2: looks for evidence of each open claim on the other pages.
pub struct VerificationEngine {
    gateway: Arc<dyn LlmGateway>,
    settings: VerificationSettings,
    progress: Arc<dyn ProgressObserver>,
    timeout: Duration,
}

/// What one claim's scan produced; applied to memory by the caller.
#[derive(Debug)]
struct ClaimOutcome {
    claim_id: ClaimId,
    evidence: Option<Evidence>,
    calls: usize,
    warnings: Vec<AnalysisWarning>,
}

/// Shared, read-only inputs of the per-claim tasks.
struct ScanContext {
    gateway: Arc<dyn LlmGateway>,
    chunks: Vec<Chunk>,
    settings: VerificationSettings,
    model: String,
    timeout: Duration,
}

impl VerificationEngine {
    pub fn new(
        gateway: Arc<dyn LlmGateway>,
        settings: VerificationSettings,
        gateway_settings: &GatewaySettings,
    ) -> Self {
        Self {
            gateway,
            settings,
            progress: Arc::new(NoProgress),
            timeout: gateway_settings.text_timeout(),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressObserver>) -> Self {
        self.progress = progress;
        self
    }

    /// Try to verify every `OPEN` claim in `claims` against `chunks`.
    ///
    /// Claims are scanned concurrently; each scan stops at the first chunk the
    /// model accepts as evidence. Memory is updated only after all scans finish.
    #[instrument(skip_all, fields(chunks = chunks.len(), claims = claims.len(), model = %model))]
    pub async fn verify(
        &self,
        chunks: &[Chunk],
        mut claims: ClaimMemory,
        model: &str,
    ) -> VerificationReport {
        let open: Vec<Claim> = claims.open_claims().cloned().collect();
        let mut report = VerificationReport {
            claims: ClaimMemory::new(),
            warnings: Vec::new(),
            verified_count: 0,
            calls_made: 0,
        };

        if open.is_empty() || chunks.is_empty() {
            info!("Nothing to verify");
            report.claims = claims;
            return report;
        }

        let mut ordered = chunks.to_vec();
        ordered.sort_by_key(|c| c.page);
        let context = Arc::new(ScanContext {
            gateway: Arc::clone(&self.gateway),
            chunks: ordered,
            settings: self.settings.clone(),
            model: model.to_string(),
            timeout: self.timeout,
        });

        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let mut join_set = JoinSet::new();
        for claim in open.iter().cloned() {
            let context = Arc::clone(&context);
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                scan_claim(&context, claim).await
            });
        }

        let total = open.len();
        let mut outcomes = Vec::with_capacity(total);
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(error = %e, "Verification task panicked");
                    report.warnings.push(AnalysisWarning::from_error(
                        &AuditError::Internal(e.to_string()),
                        None,
                        None,
                    ));
                }
            }
            self.progress.on_progress(
                outcomes.len() as f32 / total as f32,
                &format!("Pass 2: claim {}/{}", outcomes.len(), total),
            );
        }

        outcomes.sort_by_key(|o| o.claim_id);
        for outcome in outcomes {
            report.calls_made += outcome.calls;
            report.warnings.extend(outcome.warnings);
            let Some(evidence) = outcome.evidence else {
                continue;
            };
            match claims.verify(outcome.claim_id, evidence) {
                UpdateOutcome::Applied => report.verified_count += 1,
                other => debug!(id = outcome.claim_id, ?other, "Evidence not applied"),
            }
        }

        self.progress.on_progress(1.0, "Pass 2 complete");
        info!(
            verified = report.verified_count,
            still_open = claims.open_count(),
            calls = report.calls_made,
            "Pass 2 complete"
        );
        report.claims = claims;
        report
    }
}

/// Walk the chunks in page order, skipping the claim's own page, and ask the
/// model about every chunk that clears the keyword threshold.
async fn scan_claim(context: &ScanContext, claim: Claim) -> ClaimOutcome {
    let mut outcome = ClaimOutcome {
        claim_id: claim.id,
        evidence: None,
        calls: 0,
        warnings: Vec::new(),
    };

    let keywords = significant_keywords(&claim.text, context.settings.min_keyword_len);
    if keywords.is_empty() {
        debug!(id = claim.id, "Claim has no significant keywords");
        return outcome;
    }

    for chunk in context.chunks.iter().filter(|c| c.page != claim.page) {
        let overlap = keyword_overlap(&keywords, &chunk.text);
        if overlap < context.settings.keyword_match_threshold {
            continue;
        }
        debug!(id = claim.id, page = chunk.page, overlap, "Verification candidate");

        let request = TextRequest {
            model: context.model.clone(),
            system_prompt: VERIFICATION_SYSTEM_PROMPT.to_string(),
            user_prompt: verification_user_prompt(
                &claim,
                &chunk.text,
                context.settings.evidence_excerpt_chars,
            ),
            schema: ResponseSchema::ClaimVerification,
            temperature: 0.0,
            timeout: context.timeout,
        };
        outcome.calls += 1;

        let verdict = context
            .gateway
            .call_text(request)
            .await
            .and_then(StructuredResponse::into_verdict);

        match verdict {
            Ok(verdict) if verdict.is_evidence => {
                outcome.evidence = Some(Evidence {
                    page: chunk.page,
                    reason: verdict.reason,
                    source: EvidenceSource::CrossReference,
                });
                break;
            }
            Ok(_) => {}
            Err(e @ AuditError::MalformedResponse(_)) => {
                warn!(id = claim.id, page = chunk.page, error = %e, "Malformed verdict, treating as no evidence");
                outcome
                    .warnings
                    .push(AnalysisWarning::from_error(&e, Some(chunk.page), Some(claim.id)));
            }
            Err(e) => {
                warn!(id = claim.id, page = chunk.page, error = %e, "Verification call failed, leaving claim open");
                outcome
                    .warnings
                    .push(AnalysisWarning::from_error(&e, Some(chunk.page), Some(claim.id)));
                break;
            }
        }
    }

    outcome
}
