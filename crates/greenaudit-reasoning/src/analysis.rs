use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use greenaudit_core::analysis::{
    AnalysisReport, AnalysisWarning, ClaimMemory, ClaimStatus, Evidence, EvidenceSource, Finding,
    UpdateOutcome,
};
use greenaudit_core::config::GatewaySettings;
use greenaudit_core::document::Chunk;
use greenaudit_core::gateway::{
    ChunkAnalysis, LlmGateway, ResponseSchema, StructuredResponse, TextRequest,
};
use greenaudit_core::progress::{NoProgress, ProgressObserver};

use crate::prompts::{analysis_system_prompt, analysis_user_prompt, IndicatorDefinitions};

/// Pass 1: a sequential scan over the chunks that carries claim memory from
/// page to page.
pub struct AnalysisEngine {
    gateway: Arc<dyn LlmGateway>,
    definitions: IndicatorDefinitions,
    progress: Arc<dyn ProgressObserver>,
    timeout: Duration,
}

impl AnalysisEngine {
    pub fn new(gateway: Arc<dyn LlmGateway>, settings: &GatewaySettings) -> Self {
        Self {
            gateway,
            definitions: IndicatorDefinitions::default(),
            progress: Arc::new(NoProgress),
            timeout: settings.text_timeout(),
        }
    }

    pub fn with_definitions(mut self, definitions: IndicatorDefinitions) -> Self {
        self.definitions = definitions;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressObserver>) -> Self {
        self.progress = progress;
        self
    }

    /// Analyze `chunks` with a fresh claim memory.
    pub async fn analyze(&self, chunks: &[Chunk], model: &str) -> AnalysisReport {
        self.analyze_with_memory(chunks, model, ClaimMemory::new())
            .await
    }

    /// Analyze `chunks`, continuing from a previously saved claim memory.
    ///
    /// Chunks are processed one at a time in page order. A chunk whose call
    /// fails or whose response is malformed contributes nothing and is
    /// reported in `warnings`.
    #[instrument(skip_all, fields(chunks = chunks.len(), model = %model))]
    pub async fn analyze_with_memory(
        &self,
        chunks: &[Chunk],
        model: &str,
        memory: ClaimMemory,
    ) -> AnalysisReport {
        let mut report = AnalysisReport {
            claims: memory,
            total_chunks: chunks.len(),
            ..AnalysisReport::empty(model)
        };

        if chunks.is_empty() {
            info!("No chunks to analyze");
            return report;
        }

        let mut ordered: Vec<&Chunk> = chunks.iter().collect();
        ordered.sort_by_key(|c| c.page);

        let system_prompt = analysis_system_prompt(&self.definitions);
        let total = ordered.len();

        for (i, chunk) in ordered.iter().enumerate() {
            self.progress.on_progress(
                i as f32 / total as f32,
                &format!("Pass 1: page {}/{}", i + 1, total),
            );

            let previous = i.checked_sub(1).map(|p| ordered[p]);
            let next = ordered.get(i + 1).copied();
            let request = TextRequest {
                model: model.to_string(),
                system_prompt: system_prompt.clone(),
                user_prompt: analysis_user_prompt(previous, chunk, next, &report.claims),
                schema: ResponseSchema::ChunkAnalysis,
                temperature: 0.0,
                timeout: self.timeout,
            };

            let response = self
                .gateway
                .call_text(request)
                .await
                .and_then(StructuredResponse::into_chunk_analysis);

            match response {
                Ok(analysis) => apply_chunk_analysis(chunk.page, analysis, &mut report),
                Err(e) => {
                    warn!(page = chunk.page, error = %e, "Chunk analysis failed, skipping page");
                    report
                        .warnings
                        .push(AnalysisWarning::from_error(&e, Some(chunk.page), None));
                }
            }
        }

        report.analyzed_at = Utc::now();
        self.progress.on_progress(1.0, "Pass 1 complete");
        info!(
            findings = report.findings.len(),
            claims = report.claims.len(),
            open = report.claims.open_count(),
            warnings = report.warnings.len(),
            "Pass 1 complete"
        );
        report
    }
}

/// Fold one validated chunk response into the running report.
fn apply_chunk_analysis(page: u32, analysis: ChunkAnalysis, report: &mut AnalysisReport) {
    let ChunkAnalysis {
        findings,
        new_claims,
        claim_updates,
    } = analysis;

    report
        .findings
        .extend(findings.into_iter().map(|draft| Finding {
            page,
            category: draft.category,
            quote: draft.quote,
            reasoning: draft.reasoning,
        }));

    for draft in new_claims {
        let text = draft.claim.trim();
        if text.is_empty() {
            continue;
        }
        let id = report
            .claims
            .add(text.to_string(), draft.context, page);
        debug!(id, page, "New claim");
    }

    for update in claim_updates {
        if update.status != ClaimStatus::PotentiallyVerified {
            continue;
        }
        let evidence = Evidence {
            page,
            reason: update.reason,
            source: EvidenceSource::Inline,
        };
        match report.claims.verify(update.id, evidence) {
            UpdateOutcome::Applied => debug!(id = update.id, page, "Claim verified inline"),
            outcome => debug!(id = update.id, page, ?outcome, "Inline claim update ignored"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use greenaudit_core::analysis::FindingCategory;

    use super::*;
    use crate::test_support::{chunks, StubGateway};

    #[tokio::test]
    async fn empty_input_makes_no_calls() {
        let gateway = Arc::new(StubGateway::text(|_| unreachable!("no call expected")));
        let engine = AnalysisEngine::new(gateway.clone(), &GatewaySettings::default());

        let report = engine.analyze(&[], "test-model").await;
        assert!(report.findings.is_empty());
        assert!(report.claims.is_empty());
        assert_eq!(gateway.text_calls(), 0);
    }

    #[tokio::test]
    async fn findings_take_the_current_page() {
        let gateway = Arc::new(StubGateway::text(|req| {
            if req.user_prompt.contains("page 2 ===") {
                r#"{"findings": [{"category": "VAGUE", "quote": "eco", "reasoning": "no metric"}]}"#
                    .into()
            } else {
                "{}".into()
            }
        }));
        let engine = AnalysisEngine::new(gateway, &GatewaySettings::default());

        let report = engine.analyze(&chunks(&["a", "b", "c"]), "m").await;
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].page, 2);
        assert_eq!(report.findings[0].category, FindingCategory::Vague);
    }

    #[tokio::test]
    async fn inline_update_from_same_page_is_ignored() {
        let gateway = Arc::new(StubGateway::text(|req| {
            if req.user_prompt.contains("page 1 ===") {
                r#"{"new_claims": [{"claim": "Net zero by 2040", "context": "strategy"}],
                    "claim_updates": [{"id": 1, "status": "POTENTIALLY_VERIFIED", "reason": "x"}]}"#
                    .into()
            } else {
                r#"{"claim_updates": [{"id": 1, "status": "POTENTIALLY_VERIFIED", "reason": "plan approved"}]}"#
                    .into()
            }
        }));
        let engine = AnalysisEngine::new(gateway, &GatewaySettings::default());

        let report = engine.analyze(&chunks(&["a", "b"]), "m").await;
        let claim = report.claims.get(1).unwrap();
        assert_eq!(claim.status, ClaimStatus::PotentiallyVerified);
        let evidence = claim.evidence.as_ref().unwrap();
        assert_eq!(evidence.page, 2);
        assert_eq!(evidence.source, EvidenceSource::Inline);
    }

    #[tokio::test]
    async fn blank_claims_are_dropped() {
        let gateway = Arc::new(StubGateway::text(|_| {
            r#"{"new_claims": [{"claim": "   "}, {"claim": "Plant 1m trees"}]}"#.into()
        }));
        let engine = AnalysisEngine::new(gateway, &GatewaySettings::default());

        let report = engine.analyze(&chunks(&["a"]), "m").await;
        assert_eq!(report.claims.len(), 1);
        assert_eq!(report.claims.get(1).unwrap().text, "Plant 1m trees");
    }

    #[tokio::test]
    async fn resumes_numbering_from_saved_memory() {
        let mut memory = ClaimMemory::new();
        memory.add("Old claim".into(), String::new(), 1);

        let gateway = Arc::new(StubGateway::text(|_| {
            r#"{"new_claims": [{"claim": "New claim"}]}"#.into()
        }));
        let engine = AnalysisEngine::new(gateway, &GatewaySettings::default());

        let report = engine.analyze_with_memory(&chunks(&["a"]), "m", memory).await;
        assert_eq!(report.claims.len(), 2);
        assert_eq!(report.claims.get(2).unwrap().text, "New claim");
    }

    #[tokio::test]
    async fn progress_is_reported_per_chunk() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let observer = move |fraction: f32, _msg: &str| sink.lock().unwrap().push(fraction);

        let gateway = Arc::new(StubGateway::text(|_| "{}".into()));
        let engine = AnalysisEngine::new(gateway, &GatewaySettings::default())
            .with_progress(Arc::new(observer));

        engine.analyze(&chunks(&["a", "b"]), "m").await;
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(*seen.last().unwrap(), 1.0);
    }
}
