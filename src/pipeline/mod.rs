//! Prospect pipeline: the per-prospect state machine, the orchestrator and
//! run reporting.

mod orchestrator;
mod report;
mod state;

pub use orchestrator::{CancelToken, DraftPipeline, RunMode};
pub use report::{InvalidRow, RunReport, RunSummary, ValidationReport};
pub use state::{
    Phase, PhaseError, PipelineResult, PipelineStatus, ProspectState, StateMachine, TransitionError,
    CANCELLED_REASON,
};
