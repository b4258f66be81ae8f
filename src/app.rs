//! Application wiring.
//!
//! Turns configuration and credentials into a ready-to-run [`DraftPipeline`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::ai::{provider_from_config, LlmProvider};
use crate::core::{
    Config, Credentials, DraftBackend, FatalConfigError, SenderProfile, WriterMode,
};
use crate::pipeline::{DraftPipeline, RunMode, RunReport};
use crate::tools::{
    CompanyResearchTool, DirectoryDraftStore, DraftStore, EmailWriter, GmailDraftStore,
    LlmResearchBackend, LlmWriter, ProfileMatcherTool, QualityCheckerTool, ResearchBackend,
    TemplateWriter,
};

/// Loaded configuration plus credentials.
#[derive(Debug)]
pub struct App {
    pub config: Config,
    pub credentials: Credentials,
}

impl App {
    pub fn new(config: Config, credentials: Credentials) -> Self {
        Self {
            config,
            credentials,
        }
    }

    /// Load the sender profile from `path`, or from `profile.path` in config.
    pub fn load_profile(
        &self,
        path: Option<&Path>,
    ) -> Result<Arc<SenderProfile>, FatalConfigError> {
        let path = path.map_or_else(
            || Config::expand_path(&self.config.profile.path),
            Path::to_path_buf,
        );
        SenderProfile::load(&path).map(Arc::new)
    }

    /// Build the pipeline for `mode`.
    pub fn build_pipeline(&self, profile: Arc<SenderProfile>, mode: RunMode) -> DraftPipeline {
        let llm = self.llm();
        let config = &self.config;

        let backend = llm
            .clone()
            .map(|p| Arc::new(LlmResearchBackend::new(p)) as Arc<dyn ResearchBackend>);
        if backend.is_none() {
            tracing::warn!(
                provider = ?config.llm.provider,
                "No LLM API key found, research will be degraded"
            );
        }
        let researcher = Arc::new(CompanyResearchTool::new(backend, &config.research));
        let matcher = Arc::new(ProfileMatcherTool::new(&config.matcher));
        let checker = Arc::new(QualityCheckerTool::new(
            &config.quality,
            config.writer.max_subject_len,
        ));
        let writer = self.writer(Arc::clone(&profile), llm);

        let mut pipeline = DraftPipeline::new(profile, researcher, matcher, writer, checker)
            .with_concurrency(config.pipeline.concurrency)
            .with_max_revisions(config.pipeline.max_revisions);

        if mode == RunMode::Draft {
            pipeline = pipeline.with_store(self.store());
            if let Some(budget) = config.persistence.retry().total_attempt_budget() {
                pipeline = pipeline.with_persist_timeout(budget);
            }
        }
        pipeline
    }

    /// Where to write the audit log.
    pub fn output_path(&self, mode: RunMode, explicit: Option<&Path>) -> PathBuf {
        explicit.map(Path::to_path_buf).unwrap_or_else(|| {
            self.config
                .output
                .path
                .as_deref()
                .map_or_else(|| RunReport::default_path(mode), Config::expand_path)
        })
    }

    fn llm(&self) -> Option<Arc<dyn LlmProvider>> {
        provider_from_config(&self.config.llm, &self.credentials)
    }

    fn writer(
        &self,
        profile: Arc<SenderProfile>,
        llm: Option<Arc<dyn LlmProvider>>,
    ) -> Arc<dyn EmailWriter> {
        let config = &self.config.writer;
        let template = |profile| -> Arc<dyn EmailWriter> {
            Arc::new(TemplateWriter::new(profile, config).with_rubric(&self.config.quality))
        };
        match (config.mode, llm) {
            (WriterMode::Llm, Some(provider)) => {
                Arc::new(LlmWriter::new(provider, profile, config))
            }
            (WriterMode::Llm, None) => {
                tracing::warn!("writer.mode is llm but no LLM API key is set, using templates");
                template(profile)
            }
            (WriterMode::Template, _) => template(profile),
        }
    }

    fn store(&self) -> Arc<dyn DraftStore> {
        let config = &self.config.persistence;
        match config.backend {
            DraftBackend::Gmail => {
                if self.credentials.gmail_access_token.is_none() {
                    tracing::warn!("GMAIL_ACCESS_TOKEN is not set, draft creation will fail");
                }
                Arc::new(GmailDraftStore::new(
                    self.credentials.gmail_access_token.clone(),
                    config,
                ))
            }
            DraftBackend::Directory => Arc::new(DirectoryDraftStore::new(
                Config::expand_path(&config.directory),
                config.from.clone(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_preview_pipeline_without_credentials() {
        let app = App::new(Config::default(), Credentials::default());
        let pipeline = app.build_pipeline(Arc::new(SenderProfile::new("Alex")), RunMode::Preview);
        assert_eq!(pipeline.mode(), RunMode::Preview);
    }

    #[test]
    fn test_build_draft_pipeline() {
        let mut config = Config::default();
        config.persistence.backend = DraftBackend::Directory;
        let app = App::new(config, Credentials::default());
        let pipeline = app.build_pipeline(Arc::new(SenderProfile::new("Alex")), RunMode::Draft);
        assert_eq!(pipeline.mode(), RunMode::Draft);
    }

    #[test]
    fn test_output_path_precedence() {
        let mut config = Config::default();
        let app = App::new(config.clone(), Credentials::default());
        assert_eq!(
            app.output_path(RunMode::Draft, None),
            PathBuf::from("coldreach-draft-results.json")
        );
        assert_eq!(
            app.output_path(RunMode::Draft, Some(Path::new("x.json"))),
            PathBuf::from("x.json")
        );

        config.output.path = Some("audit.json".to_string());
        let app = App::new(config, Credentials::default());
        assert_eq!(app.output_path(RunMode::Preview, None), PathBuf::from("audit.json"));
    }

    #[test]
    fn test_missing_profile_is_fatal() {
        let app = App::new(Config::default(), Credentials::default());
        let err = app
            .load_profile(Some(Path::new("/nonexistent/profile.yaml")))
            .unwrap_err();
        assert!(matches!(err, FatalConfigError::Profile { .. }));
    }
}
