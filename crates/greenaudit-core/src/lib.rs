pub mod analysis;
pub mod api_types;
pub mod config;
pub mod document;
pub mod error;
pub mod gateway;
pub mod progress;

pub use analysis::{
    AnalysisReport, AnalysisWarning, Claim, ClaimId, ClaimMemory, ClaimStatus, Evidence,
    EvidenceSource, Finding, FindingCategory, UpdateOutcome, VerificationReport, WarningKind,
};
pub use config::{AppConfig, ExtractionSettings, GatewaySettings, VerificationSettings};
pub use document::{Chunk, PageLayout, PageSource, Region, RenderedPage, TextSpan};
pub use error::{AuditError, Result};
pub use gateway::{
    ChunkAnalysis, ClaimDraft, ClaimUpdate, FindingDraft, LlmGateway, ResponseSchema,
    StructuredResponse, TextRequest, VerificationVerdict, VisionRequest,
};
pub use progress::{NoProgress, ProgressObserver};
