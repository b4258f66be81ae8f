//! Draft quality rubric.
//!
//! Every check is scored independently in `[0, 1]`; the verdict score is the
//! weighted mean of all of them. A draft passes when the score reaches the
//! threshold and no fatal issue was found.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::QualityConfig;
use crate::prospect::ProspectRecord;

use super::text::{contains_phrase, word_count};
use super::writer::EmailDraft;
use super::QualityChecker;

static PLACEHOLDER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{[^}]*\}\}|\{[^}]*\}|\[[A-Z][A-Za-z _]*\]|<[^<>@\s]+>|\b(?:TODO|TBD|XXX)\b")
        .expect("valid placeholder regex")
});

/// Whether `text` contains an unresolved template token.
pub(crate) fn has_placeholder(text: &str) -> bool {
    PLACEHOLDER_PATTERN.is_match(text)
}

const CTA_PHRASES: &[&str] = &[
    "would love to",
    "interested in",
    "available for",
    "can we",
    "would you be",
    "let's discuss",
    "schedule a call",
    "open to a",
];

/// The rubric checks, in weight order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Personalization,
    Tone,
    Length,
    Placeholders,
    Recipient,
    CallToAction,
}

impl CheckKind {
    pub const ALL: [Self; 6] = [
        Self::Personalization,
        Self::Tone,
        Self::Length,
        Self::Placeholders,
        Self::Recipient,
        Self::CallToAction,
    ];

    pub fn weight(self) -> f64 {
        match self {
            Self::Personalization => 0.25,
            Self::Tone => 0.20,
            Self::Length | Self::Placeholders | Self::Recipient => 0.15,
            Self::CallToAction => 0.10,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Personalization => "personalization",
            Self::Tone => "tone",
            Self::Length => "length",
            Self::Placeholders => "placeholders",
            Self::Recipient => "recipient",
            Self::CallToAction => "call_to_action",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score of one rubric check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckScore {
    pub check: CheckKind,
    pub score: f64,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub fatal: bool,
}

/// Outcome of a quality check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityVerdict {
    pub passed: bool,
    pub score: f64,
    pub issues: Vec<String>,
    pub revision_hint: Option<String>,
    #[serde(default)]
    pub checks: Vec<CheckScore>,
    /// The check the revision hint was built from.
    #[serde(default)]
    pub failing_check: Option<CheckKind>,
}

/// Result of a single check before aggregation.
struct Finding {
    score: f64,
    fatal: bool,
    issue: Option<String>,
    hint: Option<String>,
}

impl Finding {
    fn pass() -> Self {
        Self {
            score: 1.0,
            fatal: false,
            issue: None,
            hint: None,
        }
    }

    fn fail(score: f64, issue: String, hint: String) -> Self {
        Self {
            score,
            fatal: false,
            issue: Some(issue),
            hint: Some(hint),
        }
    }

    fn fatal(mut self) -> Self {
        self.fatal = true;
        self
    }
}

/// The quality checker tool.
#[derive(Debug, Clone)]
pub struct QualityCheckerTool {
    threshold: f64,
    min_body_words: usize,
    max_body_words: usize,
    max_subject_len: usize,
    forbidden_phrases: Vec<String>,
}

impl Default for QualityCheckerTool {
    fn default() -> Self {
        Self::new(
            &QualityConfig::default(),
            crate::core::WriterConfig::default().max_subject_len,
        )
    }
}

impl QualityCheckerTool {
    /// Minimum subject length in characters.
    pub const MIN_SUBJECT_LEN: usize = 10;

    pub fn new(config: &QualityConfig, max_subject_len: usize) -> Self {
        Self {
            threshold: config.threshold,
            min_body_words: config.min_body_words,
            max_body_words: config.max_body_words,
            max_subject_len,
            forbidden_phrases: config.forbidden_phrases.clone(),
        }
    }

    fn evaluate(
        &self,
        check: CheckKind,
        prospect: &ProspectRecord,
        draft: &EmailDraft,
    ) -> Finding {
        match check {
            CheckKind::Personalization => Self::personalization(prospect, draft),
            CheckKind::Tone => self.tone(draft),
            CheckKind::Length => self.length(draft),
            CheckKind::Placeholders => Self::placeholders(draft),
            CheckKind::Recipient => Self::recipient(prospect, draft),
            CheckKind::CallToAction => Self::call_to_action(draft),
        }
    }

    fn personalization(prospect: &ProspectRecord, draft: &EmailDraft) -> Finding {
        let body = draft.body.to_lowercase();
        let has_company = body.contains(&prospect.company().to_lowercase());
        let has_role = body.contains(&prospect.role().to_lowercase());
        if has_company && has_role {
            return Finding::pass();
        }

        let missing: Vec<&str> = [
            (!has_company).then_some("company"),
            (!has_role).then_some("role"),
        ]
        .into_iter()
        .flatten()
        .collect();
        // Half credit per mention, so either one missing drops below the default threshold.
        Finding::fail(
            0.5 * (f64::from(u8::from(has_company)) + f64::from(u8::from(has_role))),
            format!("body does not mention the prospect's {}", missing.join(" or ")),
            format!(
                "Mention {} and the {} role explicitly in the body.",
                prospect.company(),
                prospect.role()
            ),
        )
    }

    fn tone(&self, draft: &EmailDraft) -> Finding {
        let text = format!("{}\n{}", draft.subject, draft.body);
        let found: Vec<&str> = self
            .forbidden_phrases
            .iter()
            .filter(|p| contains_phrase(&text, p))
            .map(String::as_str)
            .collect();
        if found.is_empty() {
            return Finding::pass();
        }

        let quoted = found
            .iter()
            .map(|p| format!("\"{p}\""))
            .collect::<Vec<_>>()
            .join(", ");
        Finding::fail(
            0.0,
            format!("unprofessional or pushy wording: {quoted}"),
            format!("Remove {quoted} and keep a calm, professional tone."),
        )
    }

    fn length(&self, draft: &EmailDraft) -> Finding {
        let words = word_count(&draft.body);
        let chars = draft.subject.chars().count();
        let body_ok = (self.min_body_words..=self.max_body_words).contains(&words);
        let subject_ok = (Self::MIN_SUBJECT_LEN..=self.max_subject_len).contains(&chars);
        if body_ok && subject_ok {
            return Finding::pass();
        }

        let mut problems = Vec::new();
        if !body_ok {
            problems.push(format!(
                "body has {words} words (expected {}-{})",
                self.min_body_words, self.max_body_words
            ));
        }
        if !subject_ok {
            problems.push(format!(
                "subject has {chars} characters (expected {}-{})",
                Self::MIN_SUBJECT_LEN,
                self.max_subject_len
            ));
        }
        let score = (f64::from(u8::from(body_ok)) + f64::from(u8::from(subject_ok))) / 2.0;
        Finding::fail(
            score,
            problems.join("; "),
            format!(
                "Keep the body between {} and {} words and the subject between {} and {} \
                 characters.",
                self.min_body_words,
                self.max_body_words,
                Self::MIN_SUBJECT_LEN,
                self.max_subject_len
            ),
        )
    }

    fn placeholders(draft: &EmailDraft) -> Finding {
        let text = format!("{}\n{}", draft.subject, draft.body);
        let found: Vec<&str> = PLACEHOLDER_PATTERN
            .find_iter(&text)
            .map(|m| m.as_str())
            .collect();
        if found.is_empty() {
            return Finding::pass();
        }

        let list = found.join(", ");
        Finding::fail(
            0.0,
            format!("unresolved placeholders: {list}"),
            format!("Replace the unresolved placeholders ({list}) with real content."),
        )
        .fatal()
    }

    fn recipient(prospect: &ProspectRecord, draft: &EmailDraft) -> Finding {
        if !draft.prospect_ref.email.eq_ignore_ascii_case(prospect.email()) {
            return Finding::fail(
                0.0,
                format!(
                    "draft is addressed to {} but the prospect is {}",
                    draft.prospect_ref.email,
                    prospect.email()
                ),
                format!(
                    "Address the draft to {} <{}>.",
                    prospect.name(),
                    prospect.email()
                ),
            )
            .fatal();
        }

        let greeting = draft
            .body
            .lines()
            .find(|l| !l.trim().is_empty())
            .unwrap_or_default();
        if contains_phrase(greeting, prospect.first_name()) {
            return Finding::pass();
        }
        Finding::fail(
            0.0,
            format!("greeting does not address {}", prospect.first_name()),
            format!(
                "Open with a greeting that addresses {} by name.",
                prospect.first_name()
            ),
        )
    }

    fn call_to_action(draft: &EmailDraft) -> Finding {
        if CTA_PHRASES.iter().any(|p| contains_phrase(&draft.body, p)) {
            return Finding::pass();
        }
        Finding::fail(
            0.0,
            "no clear call to action".to_string(),
            "End with a clear call to action, such as asking for a short call next week."
                .to_string(),
        )
    }
}

impl QualityChecker for QualityCheckerTool {
    fn check(&self, prospect: &ProspectRecord, draft: &EmailDraft) -> QualityVerdict {
        let mut checks = Vec::with_capacity(CheckKind::ALL.len());
        let mut issues = Vec::new();
        let mut score = 0.0;
        let mut fatal = false;
        let mut hint: Option<(CheckKind, String)> = None;

        // Weight order, so the first failing check carries the highest weight.
        for check in CheckKind::ALL {
            let finding = self.evaluate(check, prospect, draft);
            score += check.weight() * finding.score;
            fatal |= finding.fatal;
            if let Some(issue) = finding.issue {
                issues.push(format!("{check}: {issue}"));
            }
            if hint.is_none() {
                hint = finding.hint.map(|h| (check, h));
            }
            checks.push(CheckScore {
                check,
                score: finding.score,
                fatal: finding.fatal,
            });
        }

        // Weights sum to 1.0; round away float noise.
        let score = (score * 1000.0).round() / 1000.0;
        let passed = score >= self.threshold && !fatal;
        let (failing_check, revision_hint) = match hint {
            Some((check, text)) if !passed => (Some(check), Some(text)),
            _ => (None, None),
        };

        tracing::debug!(
            prospect = %prospect.email(),
            score,
            passed,
            issues = issues.len(),
            "Quality check"
        );
        QualityVerdict {
            passed,
            score,
            issues,
            revision_hint,
            checks,
            failing_check,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::writer::ProspectRef;
    use super::*;
    use crate::prospect::{validate, RawProspect};

    const SUBJECT: &str = "Python experience for TechCorp";

    const GOOD_BODY: &str = "Hi John,\n\nI came across TechCorp and your work as Software \
        Engineer. My background in Python seems relevant here, since your team is investing in \
        data tooling and automation this year. I believe this experience could add real value to \
        your team at TechCorp, and I would welcome the chance to share a few ideas tailored to \
        your priorities.\n\nWould you be open to a short call next week to discuss whether there \
        is a fit?\n\nBest regards,\nAlex";

    fn prospect() -> ProspectRecord {
        let raw = RawProspect::new(
            1,
            "John Doe",
            "john@example.com",
            "TechCorp",
            "Software Engineer",
        );
        validate(&raw).unwrap()
    }

    fn draft(subject: &str, body: &str) -> EmailDraft {
        EmailDraft {
            subject: subject.to_string(),
            body: body.to_string(),
            prospect_ref: ProspectRef {
                name: "John Doe".to_string(),
                email: "john@example.com".to_string(),
            },
        }
    }

    fn check(subject: &str, body: &str) -> QualityVerdict {
        QualityCheckerTool::default().check(&prospect(), &draft(subject, body))
    }

    #[test]
    fn test_weights_sum_to_one() {
        let total: f64 = CheckKind::ALL.iter().map(|c| c.weight()).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_good_draft_passes() {
        let verdict = check(SUBJECT, GOOD_BODY);
        assert!(verdict.passed, "issues: {:?}", verdict.issues);
        assert!((verdict.score - 1.0).abs() < 1e-9);
        assert!(verdict.issues.is_empty());
        assert_eq!(verdict.revision_hint, None);
        assert_eq!(verdict.checks.len(), 6);
    }

    #[test]
    fn test_forbidden_phrase_fails_tone() {
        let body = GOOD_BODY.replace("Hi John,", "Hey John, this is urgent and guaranteed.");
        let verdict = check(SUBJECT, &body);

        assert!(!verdict.passed);
        assert_eq!(verdict.failing_check, Some(CheckKind::Tone));
        assert!(verdict.issues.iter().any(|i| i.starts_with("tone:")));
        assert!(verdict
            .revision_hint
            .as_deref()
            .unwrap_or_default()
            .contains("\"urgent\""));
    }

    #[test]
    fn test_single_forbidden_phrase_fails() {
        let body = GOOD_BODY.replace("could add real value", "is guaranteed to add real value");
        let verdict = check(SUBJECT, &body);

        assert!(!verdict.passed, "score {}", verdict.score);
        assert!((verdict.score - 0.8).abs() < 1e-9);
        assert_eq!(verdict.failing_check, Some(CheckKind::Tone));
        assert_eq!(
            verdict.issues,
            vec!["tone: unprofessional or pushy wording: \"guaranteed\"".to_string()]
        );
    }

    #[test]
    fn test_missing_role_alone_fails() {
        let body = GOOD_BODY.replace("your work as Software Engineer", "your work");
        let verdict = check(SUBJECT, &body);

        assert!(!verdict.passed, "score {}", verdict.score);
        assert_eq!(verdict.failing_check, Some(CheckKind::Personalization));
        assert!(verdict.issues[0].contains("prospect's role"));
    }

    #[test]
    fn test_missing_company_alone_fails() {
        let body = GOOD_BODY.replace("TechCorp", "your company");
        let verdict = check("Python experience for your team", &body);

        assert!(!verdict.passed, "score {}", verdict.score);
        assert_eq!(verdict.failing_check, Some(CheckKind::Personalization));
    }

    #[test]
    fn test_placeholder_is_fatal_even_with_high_score() {
        let body = GOOD_BODY.replace("Alex", "[Your Name]");
        let verdict = check(SUBJECT, &body);

        assert!(verdict.score >= 0.85);
        assert!(!verdict.passed);
        assert_eq!(verdict.failing_check, Some(CheckKind::Placeholders));
    }

    #[test]
    fn test_placeholder_patterns() {
        for text in ["{first_name}", "{{company}}", "[Name]", "<company>", "TODO"] {
            assert!(PLACEHOLDER_PATTERN.is_match(text), "{text}");
        }
        assert!(!PLACEHOLDER_PATTERN.is_match("Alex <alex@example.com>"));
        assert!(!PLACEHOLDER_PATTERN.is_match("[see attached]"));
    }

    #[test]
    fn test_wrong_recipient_is_fatal() {
        let mut d = draft(SUBJECT, GOOD_BODY);
        d.prospect_ref.email = "someone@else.com".to_string();
        let verdict = QualityCheckerTool::default().check(&prospect(), &d);

        assert!(!verdict.passed);
        assert!(verdict
            .checks
            .iter()
            .any(|c| c.check == CheckKind::Recipient && c.fatal));
    }

    #[test]
    fn test_missing_personalization_is_highest_weight_hint() {
        let body = GOOD_BODY
            .replace("TechCorp", "your company")
            .replace("Software Engineer", "engineer");
        let verdict = check("Quick idea for your team", &body);

        assert!(!verdict.passed);
        assert_eq!(verdict.failing_check, Some(CheckKind::Personalization));
        assert!(verdict.score < 0.9);
    }

    #[test]
    fn test_short_body_and_subject() {
        let verdict = check("Hi", "Hi John, TechCorp Software Engineer. Can we talk?");
        let length = verdict
            .checks
            .iter()
            .find(|c| c.check == CheckKind::Length)
            .unwrap();
        assert!((length.score - 0.0).abs() < f64::EPSILON);
        assert!(!verdict.passed);
    }

    #[test]
    fn test_missing_cta_alone_still_passes() {
        let body = GOOD_BODY.replace(
            "Would you be open to a short call next week to discuss whether there \
             is a fit?",
            "Thanks for reading, and good luck with the roadmap this quarter and beyond.",
        );
        let verdict = check(SUBJECT, &body);
        assert!(verdict.passed);
        assert!((verdict.score - 0.9).abs() < 1e-9);
    }
}
