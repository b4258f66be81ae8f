//! Run reporting: summary counts, the human-readable summary and the JSON
//! audit log.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::orchestrator::RunMode;
use super::state::{PipelineResult, PipelineStatus};

/// Counts per final status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub drafted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_results(results: &[PipelineResult]) -> Self {
        results.iter().fold(Self::default(), |mut summary, result| {
            summary.total += 1;
            match result.status {
                PipelineStatus::Drafted => summary.drafted += 1,
                PipelineStatus::Skipped => summary.skipped += 1,
                PipelineStatus::Failed => summary.failed += 1,
            }
            summary
        })
    }

    /// Drafted share of all rows, in percent.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.drafted as f64 * 100.0 / self.total as f64
        }
    }
}

/// The audit log of one run.
///
/// Run id and timestamps live on the envelope only, so `results` are
/// identical across runs over the same input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub summary: RunSummary,
    pub results: Vec<PipelineResult>,
}

impl RunReport {
    pub fn new(mode: RunMode, started_at: DateTime<Utc>, results: Vec<PipelineResult>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            mode,
            started_at,
            finished_at: Utc::now(),
            summary: RunSummary::from_results(&results),
            results,
        }
    }

    /// Default audit log location for a mode.
    pub fn default_path(mode: RunMode) -> PathBuf {
        PathBuf::from(format!("coldreach-{mode}-results.json"))
    }

    /// Write the report as pretty JSON.
    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Human-readable summary with itemized failures.
    ///
    /// Preview runs also print every composed draft, since nothing was
    /// created in the mailbox.
    pub fn render(&self) -> String {
        let s = &self.summary;
        let mut out = String::new();
        let _ = writeln!(out, "coldreach {} run {}", self.mode, self.run_id);
        let _ = writeln!(out, "  Total:    {}", s.total);
        let _ = writeln!(out, "  Drafted:  {}", s.drafted);
        let _ = writeln!(out, "  Skipped:  {}", s.skipped);
        let _ = writeln!(out, "  Failed:   {}", s.failed);
        let _ = writeln!(out, "  Success:  {:.1}%", s.success_rate());

        if self.mode == RunMode::Preview {
            self.render_drafts(&mut out);
        }

        let problems: Vec<&PipelineResult> = self
            .results
            .iter()
            .filter(|r| r.status != PipelineStatus::Drafted)
            .collect();
        if !problems.is_empty() {
            let _ = writeln!(out, "\nNot drafted:");
            for result in problems {
                let _ = writeln!(
                    out,
                    "  row {:>4}  {:<8} {} ({}): {}",
                    result.row,
                    result.status,
                    result.prospect.label(),
                    result.phase,
                    result.error.as_deref().unwrap_or("no reason recorded")
                );
            }
        }
        out
    }

    fn render_drafts(&self, out: &mut String) {
        let drafts = self
            .results
            .iter()
            .filter(|r| r.status == PipelineStatus::Drafted)
            .filter_map(|r| r.draft.as_ref().map(|d| (r.row, d)));

        for (index, (row, draft)) in drafts.enumerate() {
            if index == 0 {
                let _ = writeln!(out, "\nDrafts:");
            }
            let _ = writeln!(
                out,
                "\n  row {:>4}  To: {} <{}>",
                row,
                draft.prospect_ref.name,
                draft.prospect_ref.email
            );
            let _ = writeln!(out, "  Subject: {}", draft.subject);
            for line in draft.body.lines() {
                let _ = writeln!(out, "    {line}");
            }
        }
    }
}

/// Outcome of `validate`: which rows would be processed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub total: usize,
    pub valid: usize,
    pub invalid: Vec<InvalidRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidRow {
    pub row: usize,
    pub reason: String,
}

impl ValidationReport {
    pub fn from_rows(rows: &[crate::prospect::RawProspect]) -> Self {
        let mut report = Self {
            total: rows.len(),
            ..Self::default()
        };
        for raw in rows {
            match crate::prospect::validate(raw) {
                Ok(_) => report.valid += 1,
                Err(e) => report.invalid.push(InvalidRow {
                    row: raw.row,
                    reason: e.to_string(),
                }),
            }
        }
        report
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "{} rows, {} valid, {} invalid\n",
            self.total,
            self.valid,
            self.invalid.len()
        );
        for row in &self.invalid {
            let _ = writeln!(out, "  row {:>4}  {}", row.row, row.reason);
        }
        out
    }
}
