//! The pipeline's tools.
//!
//! Each phase is one capability trait with one shipped implementation (two
//! for writing and persistence). The orchestrator composes them statically;
//! tests substitute stubs.

pub mod matcher;
pub mod persistence;
pub mod quality;
pub mod research;
mod text;
pub mod writer;

use async_trait::async_trait;

use crate::core::{CompositionError, PersistenceError, SenderProfile};
use crate::prospect::ProspectRecord;

pub use matcher::{Angle, AngleKind, PersonalizationMatch, ProfileMatcherTool};
pub use persistence::{DirectoryDraftStore, DraftHandle, GmailDraftStore};
pub use quality::{CheckKind, CheckScore, QualityCheckerTool, QualityVerdict};
pub use research::{
    CompanyResearchTool, Confidence, LlmResearchBackend, ResearchBackend, ResearchResult,
};
pub use writer::{EmailDraft, LlmWriter, ProspectRef, Revision, TemplateWriter};

/// Company research. Never fails; degrades instead.
#[async_trait]
pub trait Researcher: Send + Sync {
    async fn research(&self, company: &str) -> ResearchResult;
}

/// Personalization matching. Pure.
pub trait Matcher: Send + Sync {
    fn match_profile(
        &self,
        profile: &SenderProfile,
        research: &ResearchResult,
    ) -> PersonalizationMatch;
}

/// Email composition.
#[async_trait]
pub trait EmailWriter: Send + Sync {
    async fn write(
        &self,
        prospect: &ProspectRecord,
        research: &ResearchResult,
        matched: &PersonalizationMatch,
        revision: Option<&Revision>,
    ) -> Result<EmailDraft, CompositionError>;
}

/// Draft quality rubric. Pure.
pub trait QualityChecker: Send + Sync {
    fn check(&self, prospect: &ProspectRecord, draft: &EmailDraft) -> QualityVerdict;
}

/// Draft persistence.
#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn create_draft(
        &self,
        prospect: &ProspectRecord,
        draft: &EmailDraft,
    ) -> Result<DraftHandle, PersistenceError>;

    fn name(&self) -> &str;
}
