//! The draft pipeline.
//!
//! Runs research, matching, writing, quality checking and persistence for
//! each prospect. Every prospect ends in exactly one [`PipelineResult`];
//! nothing a single prospect does can abort the run.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use serde::{Deserialize, Serialize};

use crate::core::{PersistenceError, SenderProfile};
use crate::prospect::{validate, ProspectRecord, RawProspect};
use crate::tools::{
    DraftHandle, DraftStore, EmailDraft, EmailWriter, Matcher, QualityChecker, Researcher,
    Revision,
};

use super::state::{
    Phase, PhaseError, PipelineResult, PipelineStatus, ProspectState, StateMachine,
};

/// Whether drafts are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Stop after a passing quality check.
    Preview,
    /// Persist passing drafts.
    Draft,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Preview => "preview",
            Self::Draft => "draft",
        })
    }
}

/// Run-level cancellation flag.
///
/// Once set, no new prospect is started; prospects already in flight finish.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Sequences the tools for each prospect.
pub struct DraftPipeline {
    profile: Arc<SenderProfile>,
    researcher: Arc<dyn Researcher>,
    matcher: Arc<dyn Matcher>,
    writer: Arc<dyn EmailWriter>,
    checker: Arc<dyn QualityChecker>,
    store: Option<Arc<dyn DraftStore>>,
    concurrency: usize,
    max_revisions: u32,
    persist_timeout: Duration,
}

impl DraftPipeline {
    /// Create a preview pipeline processing one prospect at a time.
    pub fn new(
        profile: Arc<SenderProfile>,
        researcher: Arc<dyn Researcher>,
        matcher: Arc<dyn Matcher>,
        writer: Arc<dyn EmailWriter>,
        checker: Arc<dyn QualityChecker>,
    ) -> Self {
        Self {
            profile,
            researcher,
            matcher,
            writer,
            checker,
            store: None,
            concurrency: 1,
            max_revisions: 1,
            persist_timeout: Duration::from_secs(30),
        }
    }

    /// Persist passing drafts to `store` (draft mode).
    pub fn with_store(mut self, store: Arc<dyn DraftStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_max_revisions(mut self, max_revisions: u32) -> Self {
        self.max_revisions = max_revisions;
        self
    }

    /// Upper bound on one draft creation call, retries included.
    pub fn with_persist_timeout(mut self, timeout: Duration) -> Self {
        self.persist_timeout = timeout;
        self
    }

    pub fn mode(&self) -> RunMode {
        if self.store.is_some() {
            RunMode::Draft
        } else {
            RunMode::Preview
        }
    }

    /// Process all rows and return one result per row, in input order.
    pub async fn run(&self, rows: Vec<RawProspect>, cancel: &CancelToken) -> Vec<PipelineResult> {
        tracing::info!(
            rows = rows.len(),
            mode = %self.mode(),
            concurrency = self.concurrency,
            "Starting run"
        );

        stream::iter(rows.into_iter().map(|raw| async move {
            if cancel.is_cancelled() {
                return PipelineResult::cancelled(raw);
            }
            self.process(raw).await
        }))
        .buffered(self.concurrency)
        .collect()
        .await
    }

    /// Process one row. Never fails: every error becomes part of the result.
    pub async fn process(&self, raw: RawProspect) -> PipelineResult {
        let record = match validate(&raw) {
            Ok(record) => record,
            Err(e) => {
                tracing::info!(row = raw.row, reason = %e, "Skipping prospect");
                return PipelineResult::skipped(raw, e.to_string());
            }
        };

        let mut result = PipelineResult::started(raw);
        let outcome = AssertUnwindSafe(self.drive(&record, &mut result))
            .catch_unwind()
            .await;
        let error = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(panic) => Some(PhaseError::Panicked(panic_message(panic.as_ref()))),
        };

        match error {
            None => {
                result.status = PipelineStatus::Drafted;
                tracing::info!(
                    row = record.row(),
                    prospect = %record.email(),
                    draft_id = ?result.draft_id,
                    "Drafted"
                );
            }
            Some(e) => {
                result.status = PipelineStatus::Failed;
                tracing::warn!(
                    row = record.row(),
                    prospect = %record.email(),
                    phase = %result.phase,
                    error = %e,
                    "Prospect failed"
                );
                result.error = Some(e.to_string());
            }
        }
        result
    }

    async fn drive(
        &self,
        record: &ProspectRecord,
        result: &mut PipelineResult,
    ) -> Result<(), PhaseError> {
        let mut machine = StateMachine::new(self.max_revisions);

        result.phase = Phase::Research;
        let research = self.researcher.research(record.company()).await;
        result.research_confidence = Some(research.confidence);
        machine.advance(ProspectState::Researched)?;

        result.phase = Phase::Matching;
        let matched = self.matcher.match_profile(&self.profile, &research);
        machine.advance(ProspectState::Matched)?;

        let mut revision: Option<Revision> = None;
        let draft = loop {
            result.phase = Phase::Writing;
            let written = self
                .writer
                .write(record, &research, &matched, revision.as_ref())
                .await;
            let draft = match written {
                Ok(draft) => draft,
                Err(e) => {
                    tracing::debug!(row = record.row(), error = %e, "Composition failed");
                    if machine.state() != ProspectState::Rejected {
                        machine.advance(ProspectState::Rejected)?;
                    }
                    if machine.begin_revision().is_err() {
                        return Err(PhaseError::Composition {
                            source: e,
                            revisions: machine.revisions(),
                        });
                    }
                    result.revisions = machine.revisions();
                    revision = Some(Revision::from_error(&e));
                    continue;
                }
            };
            machine.advance(ProspectState::Written)?;

            result.phase = Phase::QualityCheck;
            let verdict = self.checker.check(record, &draft);
            machine.advance(ProspectState::QualityChecked)?;
            result.draft = Some(draft.clone());
            result.verdict = Some(verdict.clone());
            if verdict.passed {
                break draft;
            }

            tracing::debug!(row = record.row(), score = verdict.score, "Quality check failed");
            machine.advance(ProspectState::Rejected)?;
            if machine.begin_revision().is_err() {
                return Err(PhaseError::QualityRejected {
                    issues: verdict.issues,
                    revisions: machine.revisions(),
                });
            }
            result.revisions = machine.revisions();
            revision = Some(Revision::from_verdict(&verdict));
        };

        if let Some(store) = &self.store {
            result.phase = Phase::Persistence;
            let handle = self.persist(store.as_ref(), record, &draft).await?;
            result.draft_id = Some(handle.id);
            result.digest = Some(handle.digest);
        }
        machine.advance(ProspectState::Drafted)?;
        Ok(())
    }

    async fn persist(
        &self,
        store: &dyn DraftStore,
        record: &ProspectRecord,
        draft: &EmailDraft,
    ) -> Result<DraftHandle, PersistenceError> {
        tokio::time::timeout(self.persist_timeout, store.create_draft(record, draft)).await?
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
