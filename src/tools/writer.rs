//! Email composition.
//!
//! Two writers share the same boundary checks: [`TemplateWriter`] renders a
//! fixed template around the top personalization angle, [`LlmWriter`] asks
//! the configured model and parses its answer as JSON.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ai::{extract_json, LlmProvider};
use crate::core::{CompositionError, QualityConfig, SenderProfile, WriterConfig};
use crate::prospect::ProspectRecord;

use super::matcher::{Angle, AngleKind, PersonalizationMatch};
use super::quality::{has_placeholder, CheckKind, QualityVerdict};
use super::research::ResearchResult;
use super::text::{contains_phrase, word_count};
use super::EmailWriter;

/// Relevance at which the top angle must be woven into the body.
pub const PERSONALIZATION_THRESHOLD: f64 = 0.3;

/// Who a draft is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProspectRef {
    pub name: String,
    pub email: String,
}

impl From<&ProspectRecord> for ProspectRef {
    fn from(prospect: &ProspectRecord) -> Self {
        Self {
            name: prospect.name().to_string(),
            email: prospect.email().to_string(),
        }
    }
}

/// A composed email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailDraft {
    pub subject: String,
    pub body: String,
    pub prospect_ref: ProspectRef,
}

/// Feedback for a second writing attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    /// The rubric check the feedback targets, if any.
    pub check: Option<CheckKind>,
    pub hint: String,
}

impl Revision {
    /// Feedback from a failed quality check.
    pub fn from_verdict(verdict: &QualityVerdict) -> Self {
        Self {
            check: verdict.failing_check,
            hint: verdict
                .revision_hint
                .clone()
                .unwrap_or_else(|| verdict.issues.join("; ")),
        }
    }

    /// Feedback from a composition error.
    pub fn from_error(error: &CompositionError) -> Self {
        match error {
            CompositionError::SubjectTooLong { max, .. } => Self {
                check: Some(CheckKind::Length),
                hint: format!("Shorten the subject line to at most {max} characters."),
            },
            CompositionError::ControlCharacters => Self {
                check: None,
                hint: "Write the subject as a single line of plain text.".to_string(),
            },
            other => Self {
                check: None,
                hint: format!(
                    "The previous attempt failed ({other}). Return a complete subject and body."
                ),
            },
        }
    }

    fn targets(&self, check: CheckKind) -> bool {
        self.check == Some(check)
    }
}

/// Trim and check a subject/body pair at the writer boundary.
fn finalize(
    subject: &str,
    body: &str,
    prospect: &ProspectRecord,
    max_subject_len: usize,
) -> Result<EmailDraft, CompositionError> {
    let subject = subject.trim();
    let body = body.trim();
    if subject.is_empty() {
        return Err(CompositionError::Empty("subject"));
    }
    if body.is_empty() {
        return Err(CompositionError::Empty("body"));
    }
    // The subject becomes a mail header.
    if subject.chars().any(char::is_control) {
        return Err(CompositionError::ControlCharacters);
    }
    let len = subject.chars().count();
    if len > max_subject_len {
        return Err(CompositionError::SubjectTooLong {
            len,
            max: max_subject_len,
        });
    }

    Ok(EmailDraft {
        subject: subject.to_string(),
        body: body.to_string(),
        prospect_ref: ProspectRef::from(prospect),
    })
}

// ============================================================================
// Template writer
// ============================================================================

/// Deterministic writer that renders fixed templates.
///
/// On revision it changes only what the feedback targets: a tone or
/// placeholder rejection picks the first angle and signal the rubric would
/// accept, a length rejection drops the optional paragraphs of an over-long
/// body and compacts an over-long subject.
pub struct TemplateWriter {
    profile: Arc<SenderProfile>,
    max_subject_len: usize,
    max_body_words: usize,
    forbidden_phrases: Vec<String>,
}

impl TemplateWriter {
    pub fn new(profile: Arc<SenderProfile>, config: &WriterConfig) -> Self {
        Self {
            profile,
            max_subject_len: config.max_subject_len,
            max_body_words: usize::MAX,
            forbidden_phrases: Vec::new(),
        }
        .with_rubric(&QualityConfig::default())
    }

    /// Use the rubric the drafts will be checked against.
    pub fn with_rubric(mut self, quality: &QualityConfig) -> Self {
        self.max_body_words = quality.max_body_words;
        self.forbidden_phrases = quality.forbidden_phrases.clone();
        self
    }

    /// Whether the rubric would accept `text` for tone and placeholders.
    fn is_clean(&self, text: &str) -> bool {
        !has_placeholder(text) && !self.forbidden_phrases.iter().any(|p| contains_phrase(text, p))
    }

    fn pick_angle<'a>(&self, matched: &'a PersonalizationMatch, clean: bool) -> Option<&'a Angle> {
        if matched.relevance_score < PERSONALIZATION_THRESHOLD {
            return None;
        }
        if clean {
            matched
                .angles
                .iter()
                .find(|a| self.is_clean(&a.topic) && self.is_clean(&a.rationale))
        } else {
            matched.top_angle()
        }
    }

    fn subject(&self, prospect: &ProspectRecord, angle: Option<&Angle>, compact: bool) -> String {
        let full = match angle {
            Some(angle) if angle.kind == AngleKind::Skill => format!(
                "{} at {}: {} experience",
                prospect.role(),
                prospect.company(),
                angle.topic
            ),
            _ => format!("Connecting about {} at {}", prospect.role(), prospect.company()),
        };
        if !compact || full.chars().count() <= self.max_subject_len {
            return full;
        }

        let candidate = format!("Idea for {}", prospect.company());
        if candidate.chars().count() <= self.max_subject_len {
            candidate
        } else {
            format!("A note for {}", prospect.first_name())
        }
    }

    fn angle_paragraph(&self, angle: &Angle, research: &ResearchResult, layout: Layout) -> String {
        let signal = research
            .signals
            .iter()
            .find(|s| !layout.clean || self.is_clean(s));
        let opener = match signal {
            Some(signal) if !research.is_degraded() && !layout.concise => format!(
                "I noticed a recent development at {}: {}. ",
                research.company, signal
            ),
            _ => String::new(),
        };
        let pitch = match angle.kind {
            AngleKind::Skill => format!(
                "My background in {} seems relevant here, since {}.",
                angle.topic, angle.rationale
            ),
            AngleKind::Achievement => format!(
                "One thing I have done that {}: {}.",
                angle.rationale,
                angle.topic.trim_end_matches('.')
            ),
        };
        format!("{opener}{pitch}")
    }

    fn render_body(
        &self,
        prospect: &ProspectRecord,
        research: &ResearchResult,
        angle: Option<&Angle>,
        layout: Layout,
    ) -> String {
        let intro = match angle {
            Some(angle) => format!(
                "I came across {} and your work as {}. {}",
                prospect.company(),
                prospect.role(),
                self.angle_paragraph(angle, research, layout)
            ),
            None => format!(
                "I am reaching out because your work as {} at {} caught my attention. \
                 I help teams like yours turn ideas into reliable results, and I would value \
                 the chance to learn about the priorities you are focused on this year.",
                prospect.role(),
                prospect.company()
            ),
        };
        let value = match angle {
            Some(_) if !layout.concise => format!(
                "\n\nI believe this experience could add real value to your team at {}, and I \
                 would welcome the chance to share a few ideas tailored to your priorities.",
                prospect.company()
            ),
            _ => String::new(),
        };
        let title = self
            .profile
            .title
            .as_ref()
            .map(|t| format!("\n{t}"))
            .unwrap_or_default();

        format!(
            "Hi {first},\n\n{intro}{value}\n\nWould you be open to a short call next week to \
             discuss whether there is a fit?\n\nBest regards,\n{sig}{title}",
            first = prospect.first_name(),
            sig = self.profile.signature(),
        )
    }
}

/// Which optional parts of the template to render.
#[derive(Debug, Clone, Copy, Default)]
struct Layout {
    /// Drop the research opener and the value paragraph.
    concise: bool,
    /// Skip signals and angles with forbidden phrases or placeholders.
    clean: bool,
}

#[async_trait]
impl EmailWriter for TemplateWriter {
    async fn write(
        &self,
        prospect: &ProspectRecord,
        research: &ResearchResult,
        matched: &PersonalizationMatch,
        revision: Option<&Revision>,
    ) -> Result<EmailDraft, CompositionError> {
        let targets = |check| revision.is_some_and(|r| r.targets(check));
        let compact = targets(CheckKind::Length);
        let mut layout = Layout {
            concise: false,
            clean: targets(CheckKind::Tone) || targets(CheckKind::Placeholders),
        };

        let angle = self.pick_angle(matched, layout.clean);
        let subject = self.subject(prospect, angle, compact);
        let mut body = self.render_body(prospect, research, angle, layout);
        if compact && word_count(&body) > self.max_body_words {
            layout.concise = true;
            body = self.render_body(prospect, research, angle, layout);
        }
        finalize(&subject, &body, prospect, self.max_subject_len)
    }
}

// ============================================================================
// LLM writer
// ============================================================================

const WRITER_SYSTEM_PROMPT: &str = "You write short, professional, personalized cold outreach \
emails. Answer with a single JSON object and nothing else: {\"subject\": string, \"body\": \
string}. The body starts with a greeting using the recipient's first name, mentions their \
company and role, stays between 60 and 180 words, ends with a clear call to action and the \
sender's signature, and never contains placeholders, hype, or pressure tactics.";

#[derive(Debug, Deserialize)]
struct DraftPayload {
    subject: String,
    body: String,
}

/// Writer backed by an LLM provider.
pub struct LlmWriter {
    provider: Arc<dyn LlmProvider>,
    profile: Arc<SenderProfile>,
    max_subject_len: usize,
    timeout: Duration,
}

impl LlmWriter {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        profile: Arc<SenderProfile>,
        config: &WriterConfig,
    ) -> Self {
        Self {
            provider,
            profile,
            max_subject_len: config.max_subject_len,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn prompt(
        &self,
        prospect: &ProspectRecord,
        research: &ResearchResult,
        matched: &PersonalizationMatch,
        revision: Option<&Revision>,
    ) -> String {
        let mut prompt = format!(
            "Recipient: {} ({}), {} at {}.\nCompany research ({:?} confidence, {}): {}\n",
            prospect.name(),
            prospect.email(),
            prospect.role(),
            prospect.company(),
            research.confidence,
            research.industry,
            research.summary,
        );
        for signal in &research.signals {
            prompt.push_str(&format!("- {signal}\n"));
        }

        prompt.push_str(&format!("Sender: {}", self.profile.name));
        if let Some(title) = &self.profile.title {
            prompt.push_str(&format!(", {title}"));
        }
        prompt.push_str(&format!("\nSign as: {}\n", self.profile.signature()));

        if matched.relevance_score >= PERSONALIZATION_THRESHOLD && !matched.angles.is_empty() {
            prompt.push_str(
                "Personalization angles, most specific first (use at least the first):\n",
            );
            for angle in &matched.angles {
                prompt.push_str(&format!("- {} ({})\n", angle.topic, angle.rationale));
            }
        } else {
            prompt.push_str(
                "No strong personalization angle; keep the email generic but professional.\n",
            );
        }

        prompt.push_str(&format!(
            "The subject must be a single line of at most {} characters.\n",
            self.max_subject_len
        ));
        if let Some(revision) = revision {
            prompt.push_str(&format!(
                "This is a revision. Fix this problem: {}\n",
                revision.hint
            ));
        }
        prompt
    }

    fn parse(
        &self,
        prospect: &ProspectRecord,
        answer: &str,
    ) -> Result<EmailDraft, CompositionError> {
        let json = extract_json(answer)
            .ok_or_else(|| CompositionError::Malformed("no JSON object in answer".to_string()))?;
        let payload: DraftPayload =
            serde_json::from_str(json).map_err(|e| CompositionError::Malformed(e.to_string()))?;
        finalize(&payload.subject, &payload.body, prospect, self.max_subject_len)
    }
}

#[async_trait]
impl EmailWriter for LlmWriter {
    async fn write(
        &self,
        prospect: &ProspectRecord,
        research: &ResearchResult,
        matched: &PersonalizationMatch,
        revision: Option<&Revision>,
    ) -> Result<EmailDraft, CompositionError> {
        let prompt = self.prompt(prospect, research, matched, revision);
        let call = self.provider.complete(WRITER_SYSTEM_PROMPT, &prompt);
        let answer = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| {
                CompositionError::Backend(format!(
                    "timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| CompositionError::Backend(e.to_string()))?;
        self.parse(prospect, &answer)
    }
}
