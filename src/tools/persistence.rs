//! Draft persistence.
//!
//! A [`DraftStore`] receives the final email and hands back a handle. Drafts
//! are never sent.

use std::path::PathBuf;

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::core::{
    retry_async, PersistenceConfig, PersistenceError, RetryConfig, GMAIL_ACCESS_TOKEN,
};
use crate::prospect::ProspectRecord;

use super::writer::EmailDraft;
use super::DraftStore;

/// Handle to a persisted draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftHandle {
    pub id: String,
    pub backend: String,
    /// SHA-256 of the subject and body that were persisted.
    pub digest: String,
}

/// Hex SHA-256 of a draft's content.
pub fn content_digest(draft: &EmailDraft) -> String {
    let mut hasher = Sha256::new();
    hasher.update(draft.subject.as_bytes());
    hasher.update(b"\n\n");
    hasher.update(draft.body.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Render an RFC 822 plain-text message.
pub fn rfc822_message(
    from: Option<&str>,
    prospect: &ProspectRecord,
    draft: &EmailDraft,
) -> String {
    let mut message = String::new();
    if let Some(from) = from {
        message.push_str(&format!("From: {}\r\n", header_text(from)));
    }
    message.push_str(&format!(
        "To: {} <{}>\r\n",
        header_text(&draft.prospect_ref.name),
        prospect.email()
    ));
    message.push_str(&format!("Subject: {}\r\n", header_text(&draft.subject)));
    message.push_str("MIME-Version: 1.0\r\n");
    message.push_str("Content-Type: text/plain; charset=\"UTF-8\"\r\n");
    message.push_str("Content-Transfer-Encoding: 8bit\r\n\r\n");
    message.push_str(&draft.body.replace("\r\n", "\n").replace('\n', "\r\n"));
    message.push_str("\r\n");
    message
}

/// RFC 2047 encode non-ASCII header values. Control characters become
/// spaces so a value can never start a new header line.
fn header_text(value: &str) -> String {
    let value: String = value
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    if value.is_ascii() {
        value
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value))
    }
}

/// Replace characters that are unsafe in file names.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_whitespace() || "<>:\"/\\|?*".contains(c) {
                '_'
            } else {
                c
            }
        })
        .take(100)
        .collect()
}

// ============================================================================
// Gmail
// ============================================================================

#[derive(Debug, Serialize)]
struct CreateDraftRequest {
    message: RawMessage,
}

#[derive(Debug, Serialize)]
struct RawMessage {
    raw: String,
}

#[derive(Debug, Deserialize)]
struct CreateDraftResponse {
    id: String,
}

/// Creates drafts through the Gmail REST API.
pub struct GmailDraftStore {
    client: Client,
    token: Option<Zeroizing<String>>,
    base_url: String,
    from: Option<String>,
    retry: RetryConfig,
}

impl GmailDraftStore {
    pub fn new(token: Option<Zeroizing<String>>, config: &PersistenceConfig) -> Self {
        Self {
            client: Client::new(),
            token,
            base_url: config.gmail_base_url.trim_end_matches('/').to_string(),
            from: config.from.clone(),
            retry: config.retry(),
        }
    }

    async fn post(
        &self,
        token: &str,
        body: &CreateDraftRequest,
    ) -> Result<String, PersistenceError> {
        let response = self
            .client
            .post(format!("{}/gmail/v1/users/me/drafts", self.base_url))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PersistenceError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let created: CreateDraftResponse = response.json().await?;
        Ok(created.id)
    }
}

#[async_trait]
impl DraftStore for GmailDraftStore {
    async fn create_draft(
        &self,
        prospect: &ProspectRecord,
        draft: &EmailDraft,
    ) -> Result<DraftHandle, PersistenceError> {
        let token = self
            .token
            .as_ref()
            .ok_or(PersistenceError::MissingCredentials(GMAIL_ACCESS_TOKEN))?;

        let raw = URL_SAFE.encode(rfc822_message(self.from.as_deref(), prospect, draft));
        let request = CreateDraftRequest {
            message: RawMessage { raw },
        };

        let outcome = retry_async(
            &self.retry,
            || self.post(token, &request),
            PersistenceError::is_transient,
        )
        .await;
        if outcome.was_retried() {
            tracing::debug!(
                attempts = outcome.attempts,
                prospect = %prospect.email(),
                "Gmail draft retried"
            );
        }
        let id = outcome.into_result()?;

        Ok(DraftHandle {
            id,
            backend: self.name().to_string(),
            digest: content_digest(draft),
        })
    }

    fn name(&self) -> &str {
        "gmail"
    }
}

// ============================================================================
// Local directory
// ============================================================================

/// Writes each draft as an `.eml` file into a review folder.
pub struct DirectoryDraftStore {
    dir: PathBuf,
    from: Option<String>,
}

impl DirectoryDraftStore {
    pub fn new(dir: impl Into<PathBuf>, from: Option<String>) -> Self {
        Self {
            dir: dir.into(),
            from,
        }
    }
}

#[async_trait]
impl DraftStore for DirectoryDraftStore {
    async fn create_draft(
        &self,
        prospect: &ProspectRecord,
        draft: &EmailDraft,
    ) -> Result<DraftHandle, PersistenceError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let name = format!(
            "{:04}-{}.eml",
            prospect.row(),
            sanitize_filename(prospect.name())
        );
        let path = self.dir.join(name);
        tokio::fs::write(&path, rfc822_message(self.from.as_deref(), prospect, draft)).await?;

        Ok(DraftHandle {
            id: path.display().to_string(),
            backend: self.name().to_string(),
            digest: content_digest(draft),
        })
    }

    fn name(&self) -> &str {
        "directory"
    }
}
