//! Sender profile.
//!
//! The profile is loaded once at startup and shared read-only across every
//! prospect's run.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::FatalConfigError;

/// The person the outreach emails are written on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderProfile {
    /// Sender's full name
    pub name: String,

    /// Skills, in the order the sender listed them (deduplicated, case-insensitive)
    #[serde(default)]
    pub skills: Vec<String>,

    /// Achievements, most important first
    #[serde(default)]
    pub achievements: Vec<String>,

    /// Optional headline such as "Senior Backend Engineer"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Optional multi-line signature; defaults to the sender's name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl SenderProfile {
    /// Create a profile with a name and no skills or achievements.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            skills: Vec::new(),
            achievements: Vec::new(),
            title: None,
            signature: None,
        }
    }

    /// Add skills.
    pub fn with_skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skills.extend(skills.into_iter().map(Into::into));
        self.normalize();
        self
    }

    /// Add achievements.
    pub fn with_achievements<I, S>(mut self, achievements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.achievements.extend(achievements.into_iter().map(Into::into));
        self.normalize();
        self
    }

    /// Load and validate a profile from a YAML file.
    pub fn load(path: &Path) -> Result<Self, FatalConfigError> {
        let fail = |reason: String| FatalConfigError::Profile {
            path: path.to_path_buf(),
            reason,
        };

        let content = std::fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;
        let profile = Self::from_yaml(&content).map_err(fail)?;

        tracing::info!(
            path = %path.display(),
            skills = profile.skills.len(),
            achievements = profile.achievements.len(),
            "Loaded sender profile"
        );
        Ok(profile)
    }

    /// Parse and validate a profile from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, String> {
        let mut profile: Self = serde_yaml::from_str(content).map_err(|e| e.to_string())?;
        profile.normalize();
        if profile.name.is_empty() {
            return Err("`name` must not be empty".to_string());
        }
        Ok(profile)
    }

    /// The name used to sign emails.
    pub fn signature(&self) -> &str {
        self.signature.as_deref().unwrap_or(&self.name)
    }

    /// Trim entries, drop blanks, and dedupe skills case-insensitively.
    fn normalize(&mut self) {
        self.name = self.name.trim().to_string();

        let mut seen = std::collections::HashSet::new();
        self.skills = self
            .skills
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty() && seen.insert(s.to_lowercase()))
            .collect();

        self.achievements = self
            .achievements
            .iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_from_yaml() {
        let yaml = r"
name: Jane Smith
title: Backend Engineer
skills:
  - Python
  - Cloud Architecture
achievements:
  - Cut deployment time by 60% with a new CI pipeline
";
        let profile = SenderProfile::from_yaml(yaml).unwrap();
        assert_eq!(profile.name, "Jane Smith");
        assert_eq!(profile.skills, vec!["Python", "Cloud Architecture"]);
        assert_eq!(profile.achievements.len(), 1);
        assert_eq!(profile.signature(), "Jane Smith");
    }

    #[test]
    fn test_skills_deduplicated_in_order() {
        let profile =
            SenderProfile::new("Jane").with_skills(["Rust", " python ", "rust", "", "Python"]);
        assert_eq!(profile.skills, vec!["Rust", "python"]);
    }

    #[test]
    fn test_missing_name_is_rejected() {
        assert!(SenderProfile::from_yaml("skills: [Python]").is_err());
        assert!(SenderProfile::from_yaml("name: '   '").is_err());
    }

    #[test]
    fn test_malformed_yaml_is_rejected() {
        assert!(SenderProfile::from_yaml("name: [unterminated").is_err());
        assert!(SenderProfile::from_yaml("skills: not-a-list\nname: x").is_err());
    }

    #[test]
    fn test_load_missing_file_is_fatal() {
        let err = SenderProfile::load(Path::new("/no/such/profile.yaml")).unwrap_err();
        assert!(matches!(err, FatalConfigError::Profile { .. }));
    }

    #[test]
    fn test_custom_signature() {
        let mut profile = SenderProfile::new("Jane Smith");
        profile.signature = Some("Jane Smith\nStaff Engineer".to_string());
        assert_eq!(profile.signature(), "Jane Smith\nStaff Engineer");
    }
}
