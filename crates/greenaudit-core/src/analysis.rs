use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuditError;

pub type ClaimId = u64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FindingCategory {
    Vague,
    Inconsistency,
    DataGap,
}

impl FindingCategory {
    pub const ALL: [FindingCategory; 3] = [
        FindingCategory::Vague,
        FindingCategory::Inconsistency,
        FindingCategory::DataGap,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FindingCategory::Vague => "VAGUE",
            FindingCategory::Inconsistency => "INCONSISTENCY",
            FindingCategory::DataGap => "DATA_GAP",
        }
    }
}

/// A greenwashing indicator tied to one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub page: u32,
    pub category: FindingCategory,
    pub quote: String,
    pub reasoning: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimStatus {
    Open,
    PotentiallyVerified,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
    /// Proposed by the model while scanning a later page in Pass 1.
    Inline,
    /// Confirmed by the keyword-filtered cross-reference in Pass 2.
    CrossReference,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub page: u32,
    pub reason: String,
    pub source: EvidenceSource,
}

/// A strategic or quantitative assertion awaiting verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    pub text: String,
    pub context: String,
    /// Page the claim was extracted from.
    pub page: u32,
    pub status: ClaimStatus,
    pub evidence: Option<Evidence>,
}

impl Claim {
    pub fn is_open(&self) -> bool {
        self.status == ClaimStatus::Open
    }
}

/// Result of trying to attach evidence to a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    UnknownClaim,
    AlreadyVerified,
    /// Evidence came from the claim's own page.
    SelfVerification,
}

/// Every claim seen so far in a run, ordered by id.
///
/// Append-only: claims are never removed, and the only mutation is the
/// one-way `OPEN -> POTENTIALLY_VERIFIED` transition through [`ClaimMemory::verify`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Claim>", into = "Vec<Claim>")]
pub struct ClaimMemory {
    claims: Vec<Claim>,
    next_id: ClaimId,
}

impl ClaimMemory {
    pub fn new() -> Self {
        Self {
            claims: Vec::new(),
            next_id: 1,
        }
    }

    /// Append a new `OPEN` claim and return its freshly assigned id.
    pub fn add(&mut self, text: String, context: String, page: u32) -> ClaimId {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        self.claims.push(Claim {
            id,
            text,
            context,
            page,
            status: ClaimStatus::Open,
            evidence: None,
        });
        id
    }

    pub fn get(&self, id: ClaimId) -> Option<&Claim> {
        self.claims.iter().find(|c| c.id == id)
    }

    /// Mark a claim `POTENTIALLY_VERIFIED`, refusing evidence from its own page.
    pub fn verify(&mut self, id: ClaimId, evidence: Evidence) -> UpdateOutcome {
        let Some(claim) = self.claims.iter_mut().find(|c| c.id == id) else {
            return UpdateOutcome::UnknownClaim;
        };
        if !claim.is_open() {
            return UpdateOutcome::AlreadyVerified;
        }
        if evidence.page == claim.page {
            return UpdateOutcome::SelfVerification;
        }
        claim.status = ClaimStatus::PotentiallyVerified;
        claim.evidence = Some(evidence);
        UpdateOutcome::Applied
    }

    pub fn iter(&self) -> impl Iterator<Item = &Claim> {
        self.claims.iter()
    }

    pub fn open_claims(&self) -> impl Iterator<Item = &Claim> {
        self.claims.iter().filter(|c| c.is_open())
    }

    pub fn open_count(&self) -> usize {
        self.open_claims().count()
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub fn as_slice(&self) -> &[Claim] {
        &self.claims
    }
}

impl From<Vec<Claim>> for ClaimMemory {
    fn from(mut claims: Vec<Claim>) -> Self {
        claims.sort_by_key(|c| c.id);
        let next_id = claims.last().map(|c| c.id + 1).unwrap_or(1);
        Self { claims, next_id }
    }
}

impl From<ClaimMemory> for Vec<Claim> {
    fn from(memory: ClaimMemory) -> Self {
        memory.claims
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    MalformedResponse,
    GatewayUnavailable,
    CallFailed,
}

/// A unit of work that degraded instead of failing the whole pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisWarning {
    pub kind: WarningKind,
    pub page: Option<u32>,
    pub claim_id: Option<ClaimId>,
    pub message: String,
}

impl AnalysisWarning {
    pub fn from_error(error: &AuditError, page: Option<u32>, claim_id: Option<ClaimId>) -> Self {
        let kind = match error {
            AuditError::MalformedResponse(_) | AuditError::Json(_) => WarningKind::MalformedResponse,
            AuditError::GatewayUnavailable(_) => WarningKind::GatewayUnavailable,
            _ => WarningKind::CallFailed,
        };
        Self {
            kind,
            page,
            claim_id,
            message: error.to_string(),
        }
    }
}

/// Output of Pass 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub findings: Vec<Finding>,
    pub claims: ClaimMemory,
    pub warnings: Vec<AnalysisWarning>,
    pub total_chunks: usize,
    pub model_used: String,
    pub analyzed_at: DateTime<Utc>,
}

impl AnalysisReport {
    pub fn empty(model_used: &str) -> Self {
        Self {
            findings: Vec::new(),
            claims: ClaimMemory::new(),
            warnings: Vec::new(),
            total_chunks: 0,
            model_used: model_used.to_string(),
            analyzed_at: Utc::now(),
        }
    }

    /// Results are usable but some chunks were skipped.
    pub fn is_partial(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Pages whose analysis degraded.
    pub fn failed_pages(&self) -> Vec<u32> {
        let mut pages: Vec<u32> = self.warnings.iter().filter_map(|w| w.page).collect();
        pages.dedup();
        pages
    }
}

/// Output of Pass 2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub claims: ClaimMemory,
    pub warnings: Vec<AnalysisWarning>,
    pub verified_count: usize,
    pub calls_made: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evidence(page: u32) -> Evidence {
        Evidence {
            page,
            reason: "Solar park commissioned in 2023".into(),
            source: EvidenceSource::CrossReference,
        }
    }

    #[test]
    fn ids_increase_from_one() {
        let mut memory = ClaimMemory::new();
        let a = memory.add("Net zero by 2040".into(), "climate".into(), 1);
        let b = memory.add("100% green power".into(), "energy".into(), 2);
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(memory.len(), 2);
    }

    #[test]
    fn verify_rejects_own_page() {
        let mut memory = ClaimMemory::new();
        let id = memory.add("Net zero by 2040".into(), String::new(), 4);
        assert_eq!(memory.verify(id, evidence(4)), UpdateOutcome::SelfVerification);
        assert!(memory.get(id).unwrap().is_open());
    }

    #[test]
    fn verify_is_one_way() {
        let mut memory = ClaimMemory::new();
        let id = memory.add("Net zero by 2040".into(), String::new(), 1);
        assert_eq!(memory.verify(id, evidence(3)), UpdateOutcome::Applied);
        assert_eq!(memory.verify(id, evidence(5)), UpdateOutcome::AlreadyVerified);

        let claim = memory.get(id).unwrap();
        assert_eq!(claim.status, ClaimStatus::PotentiallyVerified);
        assert_eq!(claim.evidence.as_ref().unwrap().page, 3);
    }

    #[test]
    fn verify_unknown_claim() {
        let mut memory = ClaimMemory::new();
        assert_eq!(memory.verify(42, evidence(2)), UpdateOutcome::UnknownClaim);
    }

    #[test]
    fn restored_memory_continues_numbering() {
        let mut memory = ClaimMemory::new();
        memory.add("a".into(), String::new(), 1);
        memory.add("b".into(), String::new(), 1);

        let json = serde_json::to_string(&memory).unwrap();
        let mut restored: ClaimMemory = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.add("c".into(), String::new(), 2), 3);
    }

    #[test]
    fn categories_serialize_upper_snake() {
        let json = serde_json::to_string(&FindingCategory::DataGap).unwrap();
        assert_eq!(json, "\"DATA_GAP\"");
        let status = serde_json::to_string(&ClaimStatus::PotentiallyVerified).unwrap();
        assert_eq!(status, "\"POTENTIALLY_VERIFIED\"");
    }

    #[test]
    fn warning_kind_follows_error() {
        let w = AnalysisWarning::from_error(&AuditError::MalformedResponse("x".into()), Some(2), None);
        assert_eq!(w.kind, WarningKind::MalformedResponse);
        let w = AnalysisWarning::from_error(&AuditError::GatewayUnavailable("x".into()), None, Some(1));
        assert_eq!(w.kind, WarningKind::GatewayUnavailable);
    }
}
