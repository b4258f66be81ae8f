//! Core types and functionality for coldreach.
//!
//! This module contains what every phase depends on: configuration, the
//! sender profile, credentials, the error taxonomy, and retry handling.

mod config;
mod error;
mod profile;
mod retry;
mod secrets;

pub use config::{
    Config, DraftBackend, LlmConfig, LlmProviderKind, MatcherConfig, OutputConfig,
    PersistenceConfig, PipelineConfig, ProfileConfig, QualityConfig, ResearchConfig,
    WriterConfig, WriterMode,
};
pub use error::{
    CompositionError, FatalConfigError, PersistenceError, ResearchError, ValidationError,
};
pub use profile::SenderProfile;
pub use retry::{retry_async, RetryConfig, RetryResult};
pub use secrets::{Credentials, ANTHROPIC_API_KEY, GMAIL_ACCESS_TOKEN, OPENAI_API_KEY};
