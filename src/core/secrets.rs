//! Credential loading.
//!
//! API keys and tokens are injected from the environment (optionally seeded
//! from a `.env` file) and never appear in configuration, logs, or results.

use std::fmt;
use std::path::Path;

use zeroize::Zeroizing;

/// Environment variable holding the Anthropic API key.
pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";

/// Environment variable holding the OpenAI API key.
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";

/// Environment variable holding a Gmail OAuth access token.
pub const GMAIL_ACCESS_TOKEN: &str = "GMAIL_ACCESS_TOKEN";

/// Secrets available to the research/writer backends and the draft store.
#[derive(Clone, Default)]
pub struct Credentials {
    /// Anthropic API key
    pub anthropic_api_key: Option<Zeroizing<String>>,

    /// OpenAI API key
    pub openai_api_key: Option<Zeroizing<String>>,

    /// Gmail OAuth access token
    pub gmail_access_token: Option<Zeroizing<String>>,
}

impl Credentials {
    /// Load a `.env` file into the process environment, then read credentials.
    ///
    /// A missing `.env` file is not an error; variables already set in the
    /// environment take precedence over the file.
    pub fn load(env_file: Option<&Path>) -> Self {
        let loaded = match env_file {
            Some(path) => dotenvy::from_path(path).map(|()| path.to_path_buf()),
            None => dotenvy::dotenv(),
        };
        match loaded {
            Ok(path) => tracing::debug!(path = %path.display(), "Loaded environment file"),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!(error = %e, "Could not read environment file"),
        }

        Self::from_env()
    }

    /// Read credentials from the current environment.
    pub fn from_env() -> Self {
        Self {
            anthropic_api_key: read_secret(ANTHROPIC_API_KEY),
            openai_api_key: read_secret(OPENAI_API_KEY),
            gmail_access_token: read_secret(GMAIL_ACCESS_TOKEN),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |s: &Option<Zeroizing<String>>| if s.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Credentials")
            .field("anthropic_api_key", &mask(&self.anthropic_api_key))
            .field("openai_api_key", &mask(&self.openai_api_key))
            .field("gmail_access_token", &mask(&self.gmail_access_token))
            .finish()
    }
}

fn read_secret(var: &str) -> Option<Zeroizing<String>> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(Zeroizing::new)
}
