#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::format_push_string)]
#![allow(clippy::unused_self)]
#![allow(clippy::unnecessary_lazy_evaluations)]

//! # coldreach
//!
//! Researched, personalized, quality-checked cold outreach drafts from a
//! prospect list.
//!
//! Each prospect row runs through five phases: company research, profile
//! matching, email composition, quality checking, and draft persistence.
//! Drafts are saved for human review and never sent.
//!
//! ## Features
//!
//! - **Fault isolation**: a failing prospect is recorded and the run moves on
//! - **Bounded revisions**: a rejected draft is rewritten with targeted feedback
//! - **Degraded research**: missing credentials or timeouts lower confidence
//!   instead of failing
//! - **Draft backends**: Gmail drafts or `.eml` files in a review folder
//! - **Audit log**: every run writes a JSON report with one entry per row
//!
//! ## Quick Start
//!
//! ```bash
//! # Check an input file
//! coldreach validate --input prospects.csv
//!
//! # Compose and check drafts without saving them
//! coldreach preview --input prospects.csv --limit 5
//!
//! # Save drafts for review
//! coldreach draft --input prospects.csv
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::use_self)]

pub mod ai;
pub mod app;
pub mod core;
pub mod pipeline;
pub mod prospect;
pub mod tools;

pub use ai::{ClaudeProvider, LlmProvider, OpenAIProvider};
pub use app::App;
pub use core::{Config, Credentials, FatalConfigError, SenderProfile};
pub use pipeline::{
    CancelToken, DraftPipeline, PipelineResult, PipelineStatus, RunMode, RunReport, RunSummary,
};
pub use prospect::{load_prospects, validate, ProspectRecord, RawProspect};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const APP_NAME: &str = "coldreach";
