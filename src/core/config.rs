//! Configuration management for coldreach.
//!
//! Handles loading configuration from TOML files. Secrets never live here;
//! see [`super::Credentials`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{FatalConfigError, RetryConfig};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Orchestrator settings
    pub pipeline: PipelineConfig,

    /// Company research settings
    pub research: ResearchConfig,

    /// Profile matcher settings
    pub matcher: MatcherConfig,

    /// Email writer settings
    pub writer: WriterConfig,

    /// Quality rubric settings
    pub quality: QualityConfig,

    /// Draft persistence settings
    pub persistence: PersistenceConfig,

    /// LLM provider settings
    pub llm: LlmConfig,

    /// Sender profile location
    pub profile: ProfileConfig,

    /// Result log settings
    pub output: OutputConfig,
}

/// Orchestrator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of prospects processed concurrently
    pub concurrency: usize,

    /// How many times a rejected draft is sent back to the writer
    pub max_revisions: u32,
}

/// Company research settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    /// Timeout for the single lookup attempt, in seconds
    pub timeout_secs: u64,

    /// Maximum number of signals kept from a lookup
    pub max_signals: usize,
}

/// Profile matcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Maximum number of personalization angles returned
    pub max_angles: usize,
}

/// Which writer composes emails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriterMode {
    /// Deterministic templates
    Template,
    /// LLM composition, parsed and validated at the boundary
    Llm,
}

/// Email writer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Template or LLM writer
    pub mode: WriterMode,

    /// Subject line character cap
    pub max_subject_len: usize,

    /// Timeout for an LLM composition call, in seconds
    pub timeout_secs: u64,
}

/// Quality rubric settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Minimum aggregate score for a draft to pass
    pub threshold: f64,

    /// Minimum body length in words
    pub min_body_words: usize,

    /// Maximum body length in words
    pub max_body_words: usize,

    /// Phrases that fail the tone check (matched on word boundaries)
    pub forbidden_phrases: Vec<String>,
}

/// Where drafts are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftBackend {
    /// Gmail drafts via the REST API
    Gmail,
    /// `.eml` files in a local review directory
    Directory,
}

/// Draft persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Gmail or local directory
    pub backend: DraftBackend,

    /// Review directory for the directory backend
    pub directory: String,

    /// Per-call timeout, in seconds
    pub timeout_secs: u64,

    /// Retries for transient Gmail failures
    pub retries: u32,

    /// Gmail API base URL
    pub gmail_base_url: String,

    /// Optional `From:` header for composed drafts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

/// LLM provider kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    /// Anthropic Claude
    Claude,
    /// OpenAI chat completions
    Openai,
}

/// LLM provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider (claude, openai)
    pub provider: LlmProviderKind,

    /// Model override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Base URL override (proxies, compatible APIs)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Sender profile location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Path to the YAML profile
    pub path: String,
}

/// Result log settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path of the JSON audit log (defaults to `coldreach-<mode>-results.json`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Config {
    /// Load configuration.
    ///
    /// Looks for config in:
    /// 1. the explicit path, if one is given (must exist)
    /// 2. `.coldreach.toml` in current directory
    /// 3. `~/.config/coldreach/config.toml`
    /// 4. Falls back to defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self, FatalConfigError> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(".coldreach.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(config_dir) = Self::config_dir() {
            let global_config = config_dir.join("config.toml");
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<Self, FatalConfigError> {
        let fail = |reason: String| FatalConfigError::Config {
            path: path.to_path_buf(),
            reason,
        };

        let content = std::fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;
        let config: Self = toml::from_str(&content).map_err(|e| fail(e.to_string()))?;
        config.validate().map_err(fail)?;

        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.pipeline.concurrency == 0 {
            return Err("pipeline.concurrency must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.quality.threshold) {
            return Err(format!(
                "quality.threshold must be within [0, 1], got {}",
                self.quality.threshold
            ));
        }
        if self.quality.min_body_words > self.quality.max_body_words {
            return Err("quality.min_body_words exceeds quality.max_body_words".to_string());
        }
        if self.writer.max_subject_len < 10 {
            return Err("writer.max_subject_len must be at least 10".to_string());
        }
        Ok(())
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("coldreach"))
    }

    /// Expand a leading `~` in a configured path.
    pub fn expand_path(raw: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(raw).into_owned())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: num_cpus::get().clamp(1, 4),
            max_revisions: 1,
        }
    }
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            max_signals: 6,
        }
    }
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self { max_angles: 5 }
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            mode: WriterMode::Template,
            max_subject_len: 80,
            timeout_secs: 60,
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            threshold: 0.9,
            min_body_words: 40,
            max_body_words: 220,
            forbidden_phrases: [
                "urgent",
                "limited time",
                "act now",
                "exclusive offer",
                "guaranteed",
                "no risk",
                "once in a lifetime",
                "hey",
                "hi there",
                "whats up",
                "awesome",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: DraftBackend::Gmail,
            directory: "drafts".to_string(),
            timeout_secs: 30,
            retries: 0,
            gmail_base_url: "https://gmail.googleapis.com".to_string(),
            from: None,
        }
    }
}

impl PersistenceConfig {
    /// Retry policy for draft creation calls.
    pub fn retry(&self) -> RetryConfig {
        RetryConfig::network(self.retries, Duration::from_secs(self.timeout_secs))
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::Claude,
            model: None,
            base_url: None,
        }
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            path: "profile.yaml".to_string(),
        }
    }
}
