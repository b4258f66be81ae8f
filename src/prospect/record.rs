//! Prospect records and row validation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::ValidationError;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});

/// One input row as read from the prospect file.
///
/// Blank cells are `None`. `row` is the 1-based data row number (the header
/// is not counted).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawProspect {
    pub row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl RawProspect {
    /// Create a fully populated row.
    pub fn new(
        row: usize,
        name: impl Into<String>,
        email: impl Into<String>,
        company: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            row,
            name: Some(name.into()),
            email: Some(email.into()),
            company: Some(company.into()),
            role: Some(role.into()),
        }
    }

    /// Short label for log lines.
    pub fn label(&self) -> String {
        match (&self.name, &self.company) {
            (Some(name), Some(company)) => format!("{name} ({company})"),
            (Some(name), None) => name.clone(),
            _ => format!("row {}", self.row),
        }
    }
}

/// A validated, normalized prospect. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProspectRecord {
    row: usize,
    name: String,
    email: String,
    company: String,
    role: String,
}

impl ProspectRecord {
    pub fn row(&self) -> usize {
        self.row
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn company(&self) -> &str {
        &self.company
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    /// First token of the name, used in greetings.
    pub fn first_name(&self) -> &str {
        self.name.split(' ').next().unwrap_or(&self.name)
    }
}

/// Validate and normalize one raw row.
///
/// Fields are checked in column order (name, email, company, role) so the
/// reported reason is stable. Whitespace runs collapse to one space and the
/// email is lowercased.
pub fn validate(raw: &RawProspect) -> Result<ProspectRecord, ValidationError> {
    let name = required(raw.name.as_deref(), "name")?;
    let email = required(raw.email.as_deref(), "email")?.to_lowercase();
    if !is_valid_email(&email) {
        return Err(ValidationError::InvalidEmail(email));
    }
    let company = required(raw.company.as_deref(), "company")?;
    let role = required(raw.role.as_deref(), "role")?;

    Ok(ProspectRecord {
        row: raw.row,
        name,
        email,
        company,
        role,
    })
}

/// Check email syntax.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

fn required(value: Option<&str>, field: &'static str) -> Result<String, ValidationError> {
    let normalized = value.map(collapse_whitespace).unwrap_or_default();
    if normalized.is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(normalized)
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
