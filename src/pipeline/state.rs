//! Per-prospect state machine and result types.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{CompositionError, PersistenceError};
use crate::prospect::RawProspect;
use crate::tools::{Confidence, EmailDraft, QualityVerdict};

/// Reason recorded for rows that were never started.
pub const CANCELLED_REASON: &str = "run cancelled before processing";

/// States of one prospect's run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProspectState {
    Validated,
    Researched,
    Matched,
    Written,
    QualityChecked,
    Rejected,
    Drafted,
    Failed,
    Skipped,
}

impl ProspectState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Drafted | Self::Failed | Self::Skipped)
    }
}

impl fmt::Display for ProspectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("illegal transition from {from} to {to}")]
    Illegal {
        from: ProspectState,
        to: ProspectState,
    },

    #[error("revision budget of {max} exhausted")]
    BudgetExhausted { max: u32 },
}

/// Guards the legal transitions of one prospect.
///
/// `Rejected -> Written` is only legal after [`StateMachine::begin_revision`]
/// reserved one unit of the revision budget.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: ProspectState,
    revisions: u32,
    max_revisions: u32,
    revision_pending: bool,
}

impl StateMachine {
    pub fn new(max_revisions: u32) -> Self {
        Self {
            state: ProspectState::Validated,
            revisions: 0,
            max_revisions,
            revision_pending: false,
        }
    }

    pub fn state(&self) -> ProspectState {
        self.state
    }

    pub fn revisions(&self) -> u32 {
        self.revisions
    }

    /// Move to `next` if the transition is legal.
    pub fn advance(&mut self, next: ProspectState) -> Result<(), TransitionError> {
        use ProspectState::{
            Drafted, Failed, Matched, QualityChecked, Rejected, Researched, Validated, Written,
        };

        let legal = match (self.state, next) {
            (from, Failed) => !from.is_terminal(),
            (Validated, Researched)
            | (Researched, Matched)
            | (Matched, Written | Rejected)
            | (Written, QualityChecked)
            | (QualityChecked, Drafted | Rejected) => true,
            (Rejected, Written) => self.revision_pending,
            _ => false,
        };
        if !legal {
            return Err(TransitionError::Illegal {
                from: self.state,
                to: next,
            });
        }

        if self.state == Rejected && next == Written {
            self.revision_pending = false;
        }
        tracing::trace!(from = %self.state, to = %next, "State transition");
        self.state = next;
        Ok(())
    }

    /// Reserve one revision. Only valid while `Rejected`.
    pub fn begin_revision(&mut self) -> Result<(), TransitionError> {
        if self.state != ProspectState::Rejected {
            return Err(TransitionError::Illegal {
                from: self.state,
                to: ProspectState::Written,
            });
        }
        if self.revisions >= self.max_revisions {
            return Err(TransitionError::BudgetExhausted {
                max: self.max_revisions,
            });
        }
        self.revisions += 1;
        self.revision_pending = true;
        Ok(())
    }
}

/// Phase a prospect reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Validation,
    Research,
    Matching,
    Writing,
    QualityCheck,
    Persistence,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::Research => "research",
            Self::Matching => "matching",
            Self::Writing => "writing",
            Self::QualityCheck => "quality check",
            Self::Persistence => "persistence",
        };
        f.write_str(name)
    }
}

/// Final status of one prospect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Drafted,
    Skipped,
    Failed,
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Drafted => "drafted",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        })
    }
}

/// Errors that end a prospect's run as `failed`.
#[derive(Debug, Error)]
pub enum PhaseError {
    #[error("composition failed after {revisions} revision(s): {source}")]
    Composition {
        source: CompositionError,
        revisions: u32,
    },

    #[error("quality check failed after {revisions} revision(s): {}", issues.join("; "))]
    QualityRejected {
        issues: Vec<String>,
        revisions: u32,
    },

    #[error("draft creation failed: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("internal error: {0}")]
    Transition(#[from] TransitionError),

    #[error("internal error: phase panicked: {0}")]
    Panicked(String),
}

/// Outcome of one input row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub row: usize,
    pub prospect: RawProspect,
    pub status: PipelineStatus,
    /// The phase the prospect stopped in.
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<EmailDraft>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<QualityVerdict>,
    pub revisions: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub research_confidence: Option<Confidence>,
}

impl PipelineResult {
    /// A validated prospect about to enter research.
    pub(crate) fn started(prospect: RawProspect) -> Self {
        Self {
            row: prospect.row,
            prospect,
            status: PipelineStatus::Failed,
            phase: Phase::Research,
            draft: None,
            error: None,
            verdict: None,
            revisions: 0,
            draft_id: None,
            digest: None,
            research_confidence: None,
        }
    }

    pub fn skipped(prospect: RawProspect, reason: impl Into<String>) -> Self {
        Self {
            status: PipelineStatus::Skipped,
            phase: Phase::Validation,
            error: Some(reason.into()),
            ..Self::started(prospect)
        }
    }

    pub fn cancelled(prospect: RawProspect) -> Self {
        Self::skipped(prospect, CANCELLED_REASON)
    }
}
