//! Claude API integration.
//!
//! Implements the LlmProvider trait for Claude.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::{AIError, LlmProvider};

/// Claude API provider.
pub struct ClaudeProvider {
    client: Client,
    api_key: Zeroizing<String>,
    model: String,
    base_url: String,
    max_tokens: u32,
}

impl ClaudeProvider {
    /// Create a new Claude provider with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: Zeroizing::new(api_key.into()),
            model: "claude-sonnet-4-20250514".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 1024,
        }
    }

    /// Create with a specific model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Create with a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Make a request to the Claude API.
    async fn request(&self, system: &str, user_message: &str) -> anyhow::Result<String> {
        let request = ClaudeRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: system.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: user_message.to_string(),
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key.as_str())
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AIError::from_status(status, body).into());
        }

        let response: ClaudeResponse = response.json().await?;

        response
            .content
            .into_iter()
            .find_map(|c| c.text)
            .ok_or_else(|| AIError::NoResponse("Claude").into())
    }
}

#[async_trait]
impl LlmProvider for ClaudeProvider {
    async fn complete(&self, system: &str, prompt: &str) -> anyhow::Result<String> {
        tracing::debug!(model = %self.model, "Sending Claude request");
        self.request(system, prompt).await
    }

    fn name(&self) -> &str {
        "claude"
    }
}

/// Claude API request structure.
#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
}

/// Message in a Claude request.
#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

/// Claude API response structure.
#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ContentBlock>,
}

/// Content block in a Claude response.
#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}
