//! Error types for coldreach.
//!
//! Per-prospect errors are recovered by the pipeline and recorded in the
//! prospect's result. Only [`FatalConfigError`] is allowed to abort a run.

use std::path::PathBuf;

use thiserror::Error;

/// A raw input row could not be turned into a prospect record.
///
/// The row is skipped and the run continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required cell is absent or blank.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The email cell is not a syntactically valid address.
    #[error("invalid email address: {0}")]
    InvalidEmail(String),
}

/// The company lookup could not be completed.
///
/// Never surfaces as a prospect failure: the research tool converts it into a
/// low-confidence result.
#[derive(Debug, Error)]
pub enum ResearchError {
    /// No LLM credentials are configured.
    #[error("no research backend is configured (missing API key)")]
    MissingCredentials,

    /// The lookup did not finish in time.
    #[error("research lookup timed out after {0}s")]
    Timeout(u64),

    /// The backend call failed.
    #[error("research backend failed: {0}")]
    Backend(String),

    /// The backend answered with something that is not a research summary.
    #[error("research output could not be parsed: {0}")]
    Malformed(String),
}

/// The writer produced a structurally invalid draft.
///
/// Fed back through the revision loop once before the prospect fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompositionError {
    /// Subject exceeds the configured character cap.
    #[error("subject line is {len} characters, limit is {max}")]
    SubjectTooLong { len: usize, max: usize },

    /// Subject or body is empty.
    #[error("composed email has an empty {0}")]
    Empty(&'static str),

    /// Subject contains a line break or another control character.
    #[error("subject line contains control characters")]
    ControlCharacters,

    /// Writer output could not be parsed into a subject and body.
    #[error("writer output could not be parsed: {0}")]
    Malformed(String),

    /// The writer backend call itself failed.
    #[error("writer backend failed: {0}")]
    Backend(String),
}

/// Draft creation failed. The composed draft is kept in the result log.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// No credentials for the draft backend.
    #[error("missing credentials: {0} is not set")]
    MissingCredentials(&'static str),

    /// The draft backend did not answer in time.
    #[error("draft creation timed out")]
    Timeout,

    /// Transport-level HTTP failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("draft backend rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// Local filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio::time::error::Elapsed> for PersistenceError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::Timeout
    }
}

impl PersistenceError {
    /// Whether retrying the same request could plausibly succeed.
    ///
    /// A timed-out request may still have created the draft, so timeouts are
    /// never retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_connect() && !e.is_timeout(),
            Self::Rejected { status, .. } => *status == 429 || *status >= 500,
            Self::Timeout | Self::MissingCredentials(_) | Self::Io(_) => false,
        }
    }
}

/// Startup failure that aborts the whole run before any prospect is processed.
#[derive(Debug, Error)]
pub enum FatalConfigError {
    /// Sender profile missing or malformed.
    #[error("sender profile {}: {reason}", path.display())]
    Profile { path: PathBuf, reason: String },

    /// Prospect input file unreadable or structurally wrong.
    #[error("input file {}: {reason}", path.display())]
    Input { path: PathBuf, reason: String },

    /// Configuration file unreadable or invalid.
    #[error("configuration {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },
}
