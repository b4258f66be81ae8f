//! Pipeline Integration Tests
//!
//! Drives `DraftPipeline` with stub tools that count their invocations.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use coldreach::core::{CompositionError, PersistenceError, SenderProfile, WriterConfig};
use coldreach::pipeline::{
    CancelToken, DraftPipeline, Phase, PipelineStatus, CANCELLED_REASON,
};
use coldreach::prospect::{ProspectRecord, RawProspect};
use coldreach::tools::{
    CheckKind, Confidence, DraftHandle, DraftStore, EmailDraft, EmailWriter, Matcher,
    PersonalizationMatch, ProfileMatcherTool, QualityChecker, QualityCheckerTool, QualityVerdict,
    ResearchResult, Researcher, Revision, TemplateWriter,
};

// ============================================================================
// Stubs
// ============================================================================

#[derive(Default)]
struct Calls {
    research: AtomicUsize,
    matcher: AtomicUsize,
    writer: AtomicUsize,
    quality: AtomicUsize,
    persistence: AtomicUsize,
}

impl Calls {
    fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

struct StubResearch {
    calls: Arc<Calls>,
    delay: Duration,
}

#[async_trait]
impl Researcher for StubResearch {
    async fn research(&self, company: &str) -> ResearchResult {
        self.calls.research.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        ResearchResult {
            company: company.to_string(),
            industry: "Technology".to_string(),
            summary: format!("{company} is planning a cloud migration"),
            signals: Vec::new(),
            confidence: Confidence::High,
        }
    }
}

struct CountingMatcher {
    calls: Arc<Calls>,
    inner: ProfileMatcherTool,
}

impl Matcher for CountingMatcher {
    fn match_profile(
        &self,
        profile: &SenderProfile,
        research: &ResearchResult,
    ) -> PersonalizationMatch {
        self.calls.matcher.fetch_add(1, Ordering::SeqCst);
        self.inner.match_profile(profile, research)
    }
}

struct CountingWriter {
    calls: Arc<Calls>,
    inner: TemplateWriter,
    /// Errors returned by the first calls, in order.
    failures: Mutex<VecDeque<CompositionError>>,
    revisions: Arc<Mutex<Vec<Option<Revision>>>>,
}

#[async_trait]
impl EmailWriter for CountingWriter {
    async fn write(
        &self,
        prospect: &ProspectRecord,
        research: &ResearchResult,
        matched: &PersonalizationMatch,
        revision: Option<&Revision>,
    ) -> Result<EmailDraft, CompositionError> {
        self.calls.writer.fetch_add(1, Ordering::SeqCst);
        self.revisions.lock().unwrap().push(revision.cloned());
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        self.inner.write(prospect, research, matched, revision).await
    }
}

/// Rejects the first `reject` checks, then defers to the real checker.
struct ScriptedChecker {
    calls: Arc<Calls>,
    reject: usize,
    inner: QualityCheckerTool,
}

impl QualityChecker for ScriptedChecker {
    fn check(&self, prospect: &ProspectRecord, draft: &EmailDraft) -> QualityVerdict {
        let n = self.calls.quality.fetch_add(1, Ordering::SeqCst);
        if n < self.reject {
            return QualityVerdict {
                passed: false,
                score: 0.5,
                issues: vec![format!("tone: rejection #{}", n + 1)],
                revision_hint: Some("Use a calmer tone.".to_string()),
                checks: Vec::new(),
                failing_check: Some(CheckKind::Tone),
            };
        }
        self.inner.check(prospect, draft)
    }
}

struct StubStore {
    calls: Arc<Calls>,
    fail: bool,
}

#[async_trait]
impl DraftStore for StubStore {
    async fn create_draft(
        &self,
        prospect: &ProspectRecord,
        _draft: &EmailDraft,
    ) -> Result<DraftHandle, PersistenceError> {
        self.calls.persistence.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PersistenceError::Rejected {
                status: 400,
                body: "bad request".to_string(),
            });
        }
        Ok(DraftHandle {
            id: format!("draft-{}", prospect.row()),
            backend: "stub".to_string(),
            digest: "0".repeat(64),
        })
    }

    fn name(&self) -> &str {
        "stub"
    }
}

struct PanickingResearch;

#[async_trait]
impl Researcher for PanickingResearch {
    async fn research(&self, company: &str) -> ResearchResult {
        if company == "Boom Inc" {
            panic!("research exploded");
        }
        ResearchResult::degraded(company)
    }
}

// ============================================================================
// Fixtures
// ============================================================================

struct Harness {
    calls: Arc<Calls>,
    revisions: Arc<Mutex<Vec<Option<Revision>>>>,
    reject: usize,
    failures: Vec<CompositionError>,
    delay: Duration,
}

impl Harness {
    fn new() -> Self {
        Self {
            calls: Arc::new(Calls::default()),
            revisions: Arc::new(Mutex::new(Vec::new())),
            reject: 0,
            failures: Vec::new(),
            delay: Duration::ZERO,
        }
    }

    fn reject(mut self, n: usize) -> Self {
        self.reject = n;
        self
    }

    fn fail_writes(mut self, failures: Vec<CompositionError>) -> Self {
        self.failures = failures;
        self
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn pipeline(&self) -> DraftPipeline {
        let profile = Arc::new(SenderProfile::new("Alex Kim").with_skills(["Python"]));
        let writer_config = WriterConfig::default();
        DraftPipeline::new(
            Arc::clone(&profile),
            Arc::new(StubResearch {
                calls: Arc::clone(&self.calls),
                delay: self.delay,
            }),
            Arc::new(CountingMatcher {
                calls: Arc::clone(&self.calls),
                inner: ProfileMatcherTool::default(),
            }),
            Arc::new(CountingWriter {
                calls: Arc::clone(&self.calls),
                inner: TemplateWriter::new(profile, &writer_config),
                failures: Mutex::new(self.failures.iter().cloned().collect()),
                revisions: Arc::clone(&self.revisions),
            }),
            Arc::new(ScriptedChecker {
                calls: Arc::clone(&self.calls),
                reject: self.reject,
                inner: QualityCheckerTool::default(),
            }),
        )
    }

    fn store(&self, fail: bool) -> Arc<StubStore> {
        Arc::new(StubStore {
            calls: Arc::clone(&self.calls),
            fail,
        })
    }
}

fn john() -> RawProspect {
    RawProspect::new(1, "John Doe", "john@example.com", "TechCorp", "Software Engineer")
}

fn rows() -> Vec<RawProspect> {
    vec![
        john(),
        RawProspect::new(2, "Jane Roe", "jane.example.com", "Acme", "CTO"),
        RawProspect::new(3, "Max Poe", "max@example.com", "DataWorks", "Head of Data"),
        RawProspect {
            row: 4,
            name: Some("No Role".into()),
            email: Some("nr@example.com".into()),
            company: Some("Acme".into()),
            role: None,
        },
        RawProspect::new(5, "Ann Lee", "ann@example.com", "PayFlow", "VP Engineering"),
    ]
}

// ============================================================================
// Ordering & Validation
// ============================================================================

#[tokio::test]
async fn test_one_result_per_row_in_input_order() {
    let harness = Harness::new();
    let pipeline = harness.pipeline().with_concurrency(3);

    let results = pipeline.run(rows(), &CancelToken::new()).await;

    assert_eq!(results.len(), 5);
    assert_eq!(results.iter().map(|r| r.row).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    assert_eq!(results[1].status, PipelineStatus::Skipped);
    assert_eq!(results[3].error.as_deref(), Some("missing required field: role"));
}

#[tokio::test]
async fn test_order_kept_when_early_rows_are_slow() {
    let harness = Harness::new().slow(Duration::from_millis(20));
    let pipeline = harness.pipeline().with_concurrency(4);

    let results = pipeline.run(rows(), &CancelToken::new()).await;
    assert_eq!(results.iter().map(|r| r.row).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_invalid_email_invokes_no_tool() {
    let harness = Harness::new();
    let pipeline = harness.pipeline().with_store(harness.store(false));

    let bad = RawProspect::new(1, "Jane Roe", "jane.example.com", "Acme", "CTO");
    let result = pipeline.process(bad).await;

    assert_eq!(result.status, PipelineStatus::Skipped);
    assert_eq!(result.phase, Phase::Validation);
    assert!(result.error.as_deref().unwrap_or_default().contains("invalid email"));
    assert_eq!(Calls::get(&harness.calls.research), 0);
    assert_eq!(Calls::get(&harness.calls.matcher), 0);
    assert_eq!(Calls::get(&harness.calls.writer), 0);
    assert_eq!(Calls::get(&harness.calls.quality), 0);
    assert_eq!(Calls::get(&harness.calls.persistence), 0);
}

// ============================================================================
// Revision Loop
// ============================================================================

#[tokio::test]
async fn test_fail_once_then_pass_is_drafted_with_two_writes() {
    let harness = Harness::new().reject(1);
    let result = harness.pipeline().process(john()).await;

    assert_eq!(result.status, PipelineStatus::Drafted);
    assert_eq!(result.revisions, 1);
    assert_eq!(Calls::get(&harness.calls.writer), 2);
    assert_eq!(Calls::get(&harness.calls.quality), 2);
    assert!(result.verdict.as_ref().is_some_and(|v| v.passed));
}

#[tokio::test]
async fn test_fail_twice_is_failed_with_second_verdict() {
    let harness = Harness::new().reject(2);
    let pipeline = harness.pipeline().with_store(harness.store(false));
    let result = pipeline.process(john()).await;

    assert_eq!(result.status, PipelineStatus::Failed);
    assert_eq!(result.phase, Phase::QualityCheck);
    assert_eq!(Calls::get(&harness.calls.writer), 2);
    assert_eq!(Calls::get(&harness.calls.persistence), 0);

    let verdict = result.verdict.as_ref().unwrap();
    assert_eq!(verdict.issues, vec!["tone: rejection #2".to_string()]);
    assert!(result.error.as_deref().unwrap_or_default().contains("tone: rejection #2"));
    assert!(result.draft.is_some());
}

#[tokio::test]
async fn test_revision_receives_quality_hint() {
    let harness = Harness::new().reject(1);
    harness.pipeline().process(john()).await;

    let revisions = harness.revisions.lock().unwrap();
    assert_eq!(revisions.len(), 2);
    assert_eq!(revisions[0], None);
    let revision = revisions[1].as_ref().unwrap();
    assert_eq!(revision.check, Some(CheckKind::Tone));
    assert_eq!(revision.hint, "Use a calmer tone.");
}

#[tokio::test]
async fn test_composition_error_uses_revision_budget() {
    let harness =
        Harness::new().fail_writes(vec![CompositionError::SubjectTooLong { len: 95, max: 80 }]);
    let result = harness.pipeline().process(john()).await;

    assert_eq!(result.status, PipelineStatus::Drafted);
    assert_eq!(result.revisions, 1);
    assert_eq!(Calls::get(&harness.calls.writer), 2);
    assert_eq!(Calls::get(&harness.calls.quality), 1);
    let revisions = harness.revisions.lock().unwrap();
    assert_eq!(revisions[1].as_ref().and_then(|r| r.check), Some(CheckKind::Length));
    // The template subject already fits, so it is not compacted.
    assert_eq!(
        result.draft.as_ref().map(|d| d.subject.as_str()),
        Some("Software Engineer at TechCorp: Python experience")
    );
}

#[tokio::test]
async fn test_tone_rejection_is_rewritten_into_a_draft() {
    let achievement = "Delivered an urgent, guaranteed cloud migration with no risk";
    let profile = Arc::new(
        SenderProfile::new("Alex Kim")
            .with_skills(["Python"])
            .with_achievements([achievement]),
    );
    let calls = Arc::new(Calls::default());
    let revisions = Arc::new(Mutex::new(Vec::new()));
    let pipeline = DraftPipeline::new(
        Arc::clone(&profile),
        Arc::new(StubResearch {
            calls: Arc::clone(&calls),
            delay: Duration::ZERO,
        }),
        Arc::new(ProfileMatcherTool::default()),
        Arc::new(CountingWriter {
            calls: Arc::clone(&calls),
            inner: TemplateWriter::new(profile, &WriterConfig::default()),
            failures: Mutex::new(VecDeque::new()),
            revisions: Arc::clone(&revisions),
        }),
        Arc::new(QualityCheckerTool::default()),
    );

    let result = pipeline.process(john()).await;

    assert_eq!(result.status, PipelineStatus::Drafted);
    assert_eq!(result.revisions, 1);
    assert_eq!(Calls::get(&calls.writer), 2);
    let revisions = revisions.lock().unwrap();
    assert_eq!(revisions[1].as_ref().and_then(|r| r.check), Some(CheckKind::Tone));

    let draft = result.draft.as_ref().unwrap();
    assert!(!draft.body.contains("guaranteed"));
    assert!(draft.body.contains("Python"));
    assert!(result.verdict.as_ref().is_some_and(|v| v.passed));
}

#[tokio::test]
async fn test_repeated_composition_error_fails() {
    let harness = Harness::new().fail_writes(vec![
        CompositionError::Malformed("not json".to_string()),
        CompositionError::Malformed("still not json".to_string()),
    ]);
    let result = harness.pipeline().process(john()).await;

    assert_eq!(result.status, PipelineStatus::Failed);
    assert_eq!(result.phase, Phase::Writing);
    assert!(result.error.as_deref().unwrap_or_default().contains("still not json"));
    assert_eq!(Calls::get(&harness.calls.quality), 0);
}

#[tokio::test]
async fn test_zero_revision_budget() {
    let harness = Harness::new().reject(1);
    let result = harness.pipeline().with_max_revisions(0).process(john()).await;

    assert_eq!(result.status, PipelineStatus::Failed);
    assert_eq!(Calls::get(&harness.calls.writer), 1);
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn test_draft_mode_records_handle() {
    let harness = Harness::new();
    let pipeline = harness.pipeline().with_store(harness.store(false));
    let result = pipeline.process(john()).await;

    assert_eq!(result.status, PipelineStatus::Drafted);
    assert_eq!(result.phase, Phase::Persistence);
    assert_eq!(result.draft_id.as_deref(), Some("draft-1"));
    assert_eq!(Calls::get(&harness.calls.persistence), 1);
}

#[tokio::test]
async fn test_preview_mode_never_persists() {
    let harness = Harness::new();
    let result = harness.pipeline().process(john()).await;

    assert_eq!(result.status, PipelineStatus::Drafted);
    assert_eq!(result.draft_id, None);
    assert_eq!(Calls::get(&harness.calls.persistence), 0);
}

#[tokio::test]
async fn test_persistence_failure_keeps_draft() {
    let harness = Harness::new();
    let pipeline = harness.pipeline().with_store(harness.store(true));
    let result = pipeline.process(john()).await;

    assert_eq!(result.status, PipelineStatus::Failed);
    assert_eq!(result.phase, Phase::Persistence);
    assert!(result.draft.is_some());
    assert!(result.error.as_deref().unwrap_or_default().contains("400"));
}

#[tokio::test]
async fn test_persistence_timeout_fails_prospect() {
    struct HangingStore;

    #[async_trait]
    impl DraftStore for HangingStore {
        async fn create_draft(
            &self,
            _: &ProspectRecord,
            _: &EmailDraft,
        ) -> Result<DraftHandle, PersistenceError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Err(PersistenceError::Timeout)
        }

        fn name(&self) -> &str {
            "hanging"
        }
    }

    let harness = Harness::new();
    let pipeline = harness
        .pipeline()
        .with_store(Arc::new(HangingStore))
        .with_persist_timeout(Duration::from_millis(50));
    let result = pipeline.process(john()).await;

    assert_eq!(result.status, PipelineStatus::Failed);
    assert!(result.error.as_deref().unwrap_or_default().contains("timed out"));
}

// ============================================================================
// Robustness
// ============================================================================

#[tokio::test]
async fn test_panicking_tool_is_isolated() {
    let profile = Arc::new(SenderProfile::new("Alex Kim").with_skills(["Python"]));
    let pipeline = DraftPipeline::new(
        Arc::clone(&profile),
        Arc::new(PanickingResearch),
        Arc::new(ProfileMatcherTool::default()),
        Arc::new(TemplateWriter::new(profile, &WriterConfig::default())),
        Arc::new(QualityCheckerTool::default()),
    );
    let rows = vec![
        RawProspect::new(1, "Bo Om", "bo@example.com", "Boom Inc", "CEO"),
        john(),
    ];

    let results = pipeline.run(rows, &CancelToken::new()).await;

    assert_eq!(results[0].status, PipelineStatus::Failed);
    assert!(results[0].error.as_deref().unwrap_or_default().contains("research exploded"));
    assert_eq!(results[1].status, PipelineStatus::Drafted);
}

#[tokio::test]
async fn test_cancelled_run_keeps_one_result_per_row() {
    let harness = Harness::new();
    let cancel = CancelToken::new();
    cancel.cancel();

    let results = harness.pipeline().run(rows(), &cancel).await;

    assert_eq!(results.len(), 5);
    assert!(results.iter().all(|r| r.status == PipelineStatus::Skipped));
    assert!(results.iter().all(|r| r.error.as_deref() == Some(CANCELLED_REASON)));
    assert_eq!(Calls::get(&harness.calls.research), 0);
}

#[tokio::test]
async fn test_idempotent_results() {
    let first = Harness::new()
        .pipeline()
        .with_concurrency(2)
        .run(rows(), &CancelToken::new())
        .await;
    let second = Harness::new()
        .pipeline()
        .with_concurrency(2)
        .run(rows(), &CancelToken::new())
        .await;
    assert_eq!(first, second);
}

// ============================================================================
// End to End
// ============================================================================

#[tokio::test]
async fn test_end_to_end_john_doe() {
    let harness = Harness::new();
    let result = harness.pipeline().process(john()).await;

    let draft = result.draft.as_ref().unwrap();
    assert!(draft.body.contains("TechCorp"));
    assert!(draft.body.contains("Python"));
    assert!(result.verdict.as_ref().unwrap().passed);
    assert_eq!(result.status, PipelineStatus::Drafted);
    assert_eq!(result.research_confidence, Some(Confidence::High));
}
