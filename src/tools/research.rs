//! Company research.
//!
//! One bounded lookup per company. Any failure (no backend, transport error,
//! timeout, unparsable answer) degrades to a low-confidence result instead of
//! failing the prospect.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ai::{extract_json, LlmProvider};
use crate::core::{ResearchConfig, ResearchError};

use super::Researcher;

/// Summary text of a degraded result.
pub const INSUFFICIENT_DATA: &str = "insufficient data";

/// How much the research can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Structured research summary for one company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchResult {
    pub company: String,
    pub industry: String,
    pub summary: String,
    pub signals: Vec<String>,
    pub confidence: Confidence,
}

impl ResearchResult {
    /// The result used when the lookup could not be completed.
    pub fn degraded(company: &str) -> Self {
        Self {
            company: company.to_string(),
            industry: infer_industry(company).to_string(),
            summary: INSUFFICIENT_DATA.to_string(),
            signals: Vec::new(),
            confidence: Confidence::Low,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.confidence == Confidence::Low
    }

    /// Summary and signals joined, for keyword matching.
    pub fn text(&self) -> String {
        let mut text = self.summary.clone();
        for signal in &self.signals {
            text.push('\n');
            text.push_str(signal);
        }
        text
    }
}

/// Guess an industry from the company name.
///
/// Keywords shorter than four characters only match at the start of a word.
pub fn infer_industry(company: &str) -> &'static str {
    const RULES: &[(&[&str], &str)] = &[
        (&["tech", "software", "ai", "ml", "data", "digital"], "Technology"),
        (&["finance", "bank", "pay", "fintech", "credit"], "Financial Services"),
        (&["health", "medical", "bio", "pharma", "care"], "Healthcare"),
        (&["retail", "ecommerce", "shop", "store", "market"], "Retail"),
        (&["consult", "advisory", "service"], "Professional Services"),
    ];

    let lower = company.to_lowercase();
    let matches = |keyword: &str| {
        if keyword.len() < 4 {
            lower.split(|c: char| !c.is_alphanumeric()).any(|word| word.starts_with(keyword))
        } else {
            lower.contains(keyword)
        }
    };
    RULES
        .iter()
        .find(|(words, _)| words.iter().any(|w| matches(w)))
        .map_or("General Business", |(_, industry)| *industry)
}

/// A source of company research.
#[async_trait]
pub trait ResearchBackend: Send + Sync {
    async fn lookup(&self, company: &str) -> Result<ResearchResult, ResearchError>;

    fn name(&self) -> &str;
}

/// Research backend that asks an LLM for a JSON summary.
pub struct LlmResearchBackend {
    provider: Arc<dyn LlmProvider>,
}

const RESEARCH_SYSTEM_PROMPT: &str = "You are a B2B sales researcher. Answer with a single JSON \
object and nothing else: {\"summary\": string, \"industry\": string, \"signals\": [string], \
\"confidence\": \"low\" | \"medium\" | \"high\"}. Signals are short, factual notes about \
recent company activity, priorities, or technology. Use confidence \"low\" if you do not know \
the company.";

#[derive(Debug, Deserialize)]
struct ResearchPayload {
    summary: String,
    #[serde(default)]
    industry: Option<String>,
    #[serde(default)]
    signals: Vec<String>,
    confidence: Confidence,
}

impl LlmResearchBackend {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    fn parse(company: &str, answer: &str) -> Result<ResearchResult, ResearchError> {
        let json = extract_json(answer)
            .ok_or_else(|| ResearchError::Malformed("no JSON object in answer".to_string()))?;
        let payload: ResearchPayload =
            serde_json::from_str(json).map_err(|e| ResearchError::Malformed(e.to_string()))?;
        if payload.summary.trim().is_empty() {
            return Err(ResearchError::Malformed("empty summary".to_string()));
        }

        Ok(ResearchResult {
            company: company.to_string(),
            industry: payload.industry.unwrap_or_default(),
            summary: payload.summary.trim().to_string(),
            signals: payload.signals,
            confidence: payload.confidence,
        })
    }
}

#[async_trait]
impl ResearchBackend for LlmResearchBackend {
    async fn lookup(&self, company: &str) -> Result<ResearchResult, ResearchError> {
        let prompt =
            format!("Research the company \"{company}\" for a personalized outreach email.");
        let answer = self
            .provider
            .complete(RESEARCH_SYSTEM_PROMPT, &prompt)
            .await
            .map_err(|e| ResearchError::Backend(e.to_string()))?;
        Self::parse(company, &answer)
    }

    fn name(&self) -> &str {
        self.provider.name()
    }
}

/// The research tool: one bounded lookup, degraded on any failure.
pub struct CompanyResearchTool {
    backend: Option<Arc<dyn ResearchBackend>>,
    timeout: Duration,
    max_signals: usize,
}

impl CompanyResearchTool {
    pub fn new(backend: Option<Arc<dyn ResearchBackend>>, config: &ResearchConfig) -> Self {
        Self {
            backend,
            timeout: Duration::from_secs(config.timeout_secs),
            max_signals: config.max_signals,
        }
    }

    async fn lookup(&self, company: &str) -> Result<ResearchResult, ResearchError> {
        let backend = self.backend.as_ref().ok_or(ResearchError::MissingCredentials)?;
        tokio::time::timeout(self.timeout, backend.lookup(company))
            .await
            .map_err(|_| ResearchError::Timeout(self.timeout.as_secs()))?
    }

    fn normalize(&self, mut result: ResearchResult) -> ResearchResult {
        result.signals = result
            .signals
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .take(self.max_signals)
            .collect();
        if result.industry.trim().is_empty() {
            result.industry = infer_industry(&result.company).to_string();
        }
        result
    }
}

#[async_trait]
impl Researcher for CompanyResearchTool {
    async fn research(&self, company: &str) -> ResearchResult {
        match self.lookup(company).await {
            Ok(result) => self.normalize(result),
            Err(ResearchError::MissingCredentials) => {
                tracing::debug!(company, "No research backend, using degraded result");
                ResearchResult::degraded(company)
            }
            Err(e) => {
                tracing::warn!(company, error = %e, "Research lookup failed, degrading");
                ResearchResult::degraded(company)
            }
        }
    }
}
