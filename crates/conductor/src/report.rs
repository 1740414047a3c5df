//! Change report: JSON for tools, Markdown for reviewers.
//!
//! Records keep emission order and carry no timestamps, so identical runs
//! serialize byte-identically.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anatomist::Analysis;
use anyhow::Context;
use common::migration::{ChangeSource, ChangeTag, RiskLevel, RuleFailure};
use common::NodeId;
use forge::Transformation;
use oracle::Assessment;
use serde::{Deserialize, Serialize};
use shadow::{FileAction, FileDiff, RunState};

use crate::config::ReportFormat;
use crate::stages::Stage;
use crate::validate::Verdict;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub id: NodeId,
    pub before_id: NodeId,
    pub after_id: NodeId,
    /// Legacy name the change is about (class, or file for unowned calls).
    pub subject: String,
    pub source: ChangeSource,
    pub tag: ChangeTag,
    pub reason: String,
    pub file: Option<String>,
    pub risk_level: RiskLevel,
    pub risk_reason: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskTotals {
    pub safe: usize,
    pub risky: usize,
    pub manual: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffCounts {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub removed: usize,
}

impl DiffCounts {
    pub fn from_diff(diff: &[FileDiff]) -> Self {
        let count = |action| diff.iter().filter(|d| d.action == action).count();
        Self {
            created: count(FileAction::Created),
            updated: count(FileAction::Updated),
            unchanged: count(FileAction::Unchanged),
            removed: count(FileAction::Removed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub file: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub source_root: String,
    pub output_root: String,
    pub stages: Vec<Stage>,
    pub rules: Vec<String>,
    pub files: usize,
    pub classes: usize,
    pub http_calls: usize,
    pub routes: usize,
    pub templates: usize,
    pub skipped: Vec<SkippedFile>,
    pub rule_failures: Vec<RuleFailure>,
    pub risk_failures: Vec<RuleFailure>,
    pub risk_totals: RiskTotals,
    pub validation: Option<Verdict>,
    /// `None` when no workspace was run.
    pub state: Option<RunState>,
    pub error: Option<String>,
    pub diff: DiffCounts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub run: RunSummary,
    pub changes: Vec<ChangeRecord>,
}

fn subject_of(analysis: &Analysis, id: &NodeId) -> String {
    if let Some(class) = analysis.owner_class(id) {
        return class.name.clone();
    }
    analysis
        .calls
        .iter()
        .find(|c| &c.node.id == id)
        .and_then(|c| c.node.file())
        .map(str::to_string)
        .unwrap_or_else(|| id.to_string())
}

impl Report {
    /// Change records in emission order. Run details are filled in by the caller.
    pub fn build(analysis: &Analysis, transformation: &Transformation, assessment: &Assessment) -> Self {
        let changes: Vec<ChangeRecord> = transformation
            .changes
            .iter()
            .map(|change| {
                let (risk_level, risk_reason) = assessment
                    .risk_of(&change.id)
                    .map(|r| (r.level, r.reason.clone()))
                    .unwrap_or((RiskLevel::Safe, oracle::DEFAULT_REASON.to_string()));
                ChangeRecord {
                    id: change.id.clone(),
                    before_id: change.before_id.clone(),
                    after_id: change.after_id.clone(),
                    subject: subject_of(analysis, &change.before_id),
                    source: change.source,
                    tag: change.tag,
                    reason: change.reason.clone(),
                    file: change.file.clone(),
                    risk_level,
                    risk_reason,
                }
            })
            .collect();

        let mut run = RunSummary {
            classes: analysis.classes().count(),
            http_calls: analysis.calls.len(),
            routes: analysis.routes.len(),
            templates: analysis.templates.len(),
            skipped: analysis
                .skipped
                .iter()
                .map(|(file, reason)| SkippedFile {
                    file: file.clone(),
                    reason: reason.clone(),
                })
                .collect(),
            rule_failures: transformation.failures.clone(),
            risk_failures: assessment.failures.clone(),
            ..Default::default()
        };
        for record in &changes {
            match record.risk_level {
                RiskLevel::Safe => run.risk_totals.safe += 1,
                RiskLevel::Risky => run.risk_totals.risky += 1,
                RiskLevel::Manual => run.risk_totals.manual += 1,
            }
        }
        Self { run, changes }
    }

    pub fn at_level(&self, level: RiskLevel) -> impl Iterator<Item = &ChangeRecord> {
        self.changes.iter().filter(move |c| c.risk_level == level)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_markdown(&self) -> String {
        let run = &self.run;
        let mut md = String::from("# Migration Report\n\n");
        let _ = writeln!(md, "- Source: `{}`", run.source_root);
        let _ = writeln!(md, "- Output: `{}`", run.output_root);
        let state = run.state.map(|s| s.to_string()).unwrap_or_else(|| "not run".to_string());
        let _ = writeln!(md, "- Run: **{}**", state);
        let _ = writeln!(
            md,
            "- Analyzed: {} files, {} classes, {} HTTP calls, {} routes, {} templates",
            run.files, run.classes, run.http_calls, run.routes, run.templates
        );
        let _ = writeln!(
            md,
            "- Output diff: {} created, {} updated, {} unchanged, {} removed",
            run.diff.created, run.diff.updated, run.diff.unchanged, run.diff.removed
        );
        if let Some(error) = &run.error {
            let _ = writeln!(md, "- Error: {}", error);
        }

        md.push_str("\n## Risk totals\n\n| Level | Changes |\n|---|---|\n");
        let _ = writeln!(md, "| manual | {} |", run.risk_totals.manual);
        let _ = writeln!(md, "| risky | {} |", run.risk_totals.risky);
        let _ = writeln!(md, "| safe | {} |", run.risk_totals.safe);

        for (level, title) in [
            (RiskLevel::Manual, "Manual migration required"),
            (RiskLevel::Risky, "Review recommended"),
            (RiskLevel::Safe, "Safe"),
        ] {
            let records: Vec<&ChangeRecord> = self.at_level(level).collect();
            if records.is_empty() {
                continue;
            }
            let _ = write!(
                md,
                "\n## {}\n\n| Change | Subject | Kind | File | Why |\n|---|---|---|---|---|\n",
                title
            );
            for r in records {
                let _ = writeln!(
                    md,
                    "| {} | {} | {} | {} | {} |",
                    r.id,
                    cell(&r.subject),
                    r.tag.as_str(),
                    r.file.as_deref().map(cell).unwrap_or_default(),
                    cell(&r.risk_reason)
                );
            }
        }

        if let Some(verdict) = &run.validation {
            let _ = write!(
                md,
                "\n## Validation\n\n- Passed: **{}**\n",
                verdict.passed
            );
            for failure in &verdict.failures {
                let _ = writeln!(md, "  - {}", failure);
            }
        }

        let failures: Vec<&RuleFailure> = run.rule_failures.iter().chain(&run.risk_failures).collect();
        if !failures.is_empty() {
            md.push_str("\n## Rule failures\n\n");
            for f in failures {
                let _ = writeln!(md, "- `{}`: {}", f.rule, f.message);
            }
        }
        if !run.skipped.is_empty() {
            md.push_str("\n## Skipped files\n\n");
            for s in &run.skipped {
                let _ = writeln!(md, "- `{}`: {}", s.file, s.reason);
            }
        }
        md
    }

    /// Writes `report.json` and/or `report.md` into `state_dir`.
    pub fn write(&self, state_dir: &Path, format: ReportFormat) -> anyhow::Result<Vec<PathBuf>> {
        fs::create_dir_all(state_dir)
            .with_context(|| format!("creating state directory {}", state_dir.display()))?;
        let mut written = Vec::new();
        if format.json() {
            let path = state_dir.join("report.json");
            fs::write(&path, self.to_json()?)
                .with_context(|| format!("writing {}", path.display()))?;
            written.push(path);
        }
        if format.markdown() {
            let path = state_dir.join("report.md");
            fs::write(&path, self.to_markdown())
                .with_context(|| format!("writing {}", path.display()))?;
            written.push(path);
        }
        Ok(written)
    }
}

fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
