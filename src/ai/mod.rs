//! LLM provider integration.
//!
//! Research lookups and the LLM writer talk to a language model through the
//! [`LlmProvider`] trait. Claude and OpenAI are supported; the provider is
//! chosen by configuration and only constructed when its API key is present.

mod claude;
mod openai;

pub use claude::ClaudeProvider;
pub use openai::OpenAIProvider;

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{Credentials, LlmConfig, LlmProviderKind};

/// Trait for LLM providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send one system + user exchange and return the model's text answer.
    async fn complete(&self, system: &str, prompt: &str) -> anyhow::Result<String>;

    /// Get the provider name.
    fn name(&self) -> &str;
}

/// AI error types.
#[derive(Debug, thiserror::Error)]
pub enum AIError {
    #[error("API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    #[error("Rate limited")]
    RateLimited,

    #[error("No response from {0}")]
    NoResponse(&'static str),
}

impl AIError {
    /// Map a non-success HTTP status and body to an error.
    pub(crate) fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Self::RateLimited
        } else {
            Self::ApiError {
                status: status.as_u16(),
                body,
            }
        }
    }
}

/// Build the configured provider, or `None` when its API key is missing.
pub fn provider_from_config(
    config: &LlmConfig,
    credentials: &Credentials,
) -> Option<Arc<dyn LlmProvider>> {
    match config.provider {
        LlmProviderKind::Claude => {
            let key = credentials.anthropic_api_key.as_ref()?;
            let mut provider = ClaudeProvider::new(key.as_str());
            if let Some(model) = &config.model {
                provider = provider.with_model(model);
            }
            if let Some(url) = &config.base_url {
                provider = provider.with_base_url(url);
            }
            Some(Arc::new(provider))
        }
        LlmProviderKind::Openai => {
            let key = credentials.openai_api_key.as_ref()?;
            let mut provider = OpenAIProvider::new(key.as_str());
            if let Some(model) = &config.model {
                provider = provider.with_model(model);
            }
            if let Some(url) = &config.base_url {
                provider = provider.with_base_url(url);
            }
            Some(Arc::new(provider))
        }
    }
}

/// Extract the JSON object from a model answer.
///
/// Models often wrap JSON in markdown fences or add a sentence around it;
/// this returns the span from the first `{` to the last `}`.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
