//! The pipeline driver.
//!
//! Stages run strictly in sequence. Everything that writes files happens
//! inside the orchestrator's workspace; the final output only changes on a
//! successful commit.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use anatomist::{Analysis, SourceSet};
use anyhow::Context;
use common::migration::RuleFailure;
use common::roles::PatternRoles;
use forge::{Engine, Output, RuleContext, Transformation};
use oracle::{Assessment, Oracle, RiskContext};
use shadow::{Orchestrator, RunState};
use tracing::{info, info_span, warn};

use crate::config::MigrationConfig;
use crate::report::{DiffCounts, Report};
use crate::stages::Stage;
use crate::validate::{Validator, Verdict};

/// Result of one `migrate` call.
#[derive(Debug)]
pub struct MigrationOutcome {
    pub report: Report,
    /// `None` when the transformation stage is disabled.
    pub state: Option<RunState>,
    pub progress_path: Option<PathBuf>,
    pub report_paths: Vec<PathBuf>,
}

impl MigrationOutcome {
    /// Committed, previewed, or nothing to commit, without a recorded error.
    pub fn succeeded(&self) -> bool {
        self.state != Some(RunState::Discarded) && self.report.run.error.is_none()
    }
}

/// Ingestion, analysis and pattern detection, honoring the stage controller.
pub fn analyze_source(config: &MigrationConfig) -> anyhow::Result<(Analysis, PatternRoles, usize)> {
    let stages = &config.stages;
    let sources = if stages.is_enabled(Stage::Ingestion) {
        let _span = info_span!("ingestion").entered();
        let sources = anatomist::ingest::scan(&config.source_root)
            .with_context(|| format!("scanning {}", config.source_root.display()))?;
        info!(
            scripts = sources.scripts.len(),
            markup = sources.markup.len(),
            other = sources.other.len(),
            "files ingested"
        );
        sources
    } else {
        SourceSet {
            root: config.source_root.clone(),
            ..Default::default()
        }
    };

    let analysis = if stages.is_enabled(Stage::Analysis) {
        let _span = info_span!("analysis").entered();
        anatomist::analyze(&sources).context("analyzing sources")?
    } else {
        Analysis {
            root: sources.root.clone(),
            ..Default::default()
        }
    };

    let roles = if stages.is_enabled(Stage::Patterns) {
        let _span = info_span!("patterns").entered();
        anatomist::detect(&analysis)
    } else {
        PatternRoles::new()
    };
    Ok((analysis, roles, sources.len()))
}

/// Everything the run produced, kept even when it fails midway.
#[derive(Default)]
struct WorkspaceRun {
    analysis: Option<Analysis>,
    roles: Option<PatternRoles>,
    files: usize,
    transformation: Option<Transformation>,
    assessment: Option<Assessment>,
    verdict: Option<Verdict>,
}

impl WorkspaceRun {
    fn analyze(&mut self, config: &MigrationConfig) -> anyhow::Result<()> {
        let (analysis, roles, files) = analyze_source(config)?;
        self.analysis = Some(analysis);
        self.roles = Some(roles);
        self.files = files;
        Ok(())
    }
}

/// The orchestrated part of a run: analysis, transformation, risk and
/// validation, all inside the workspace closure.
fn run_in_workspace(
    config: &MigrationConfig,
    validator: &dyn Validator,
    workspace: &Path,
    run: &mut WorkspaceRun,
) -> anyhow::Result<bool> {
    run.analyze(config)?;
    let (Some(analysis), Some(roles)) = (run.analysis.as_ref(), run.roles.as_ref()) else {
        anyhow::bail!("analysis produced no facts");
    };
    let out = Output::new(workspace);
    let cx = RuleContext {
        analysis,
        roles,
        out: &out,
    };
    let transformation = {
        let _span = info_span!("transformation").entered();
        Engine::selected(config.selected_rules()).run(&cx)
    };
    info!(
        changes = transformation.changes.len(),
        failures = transformation.failures.len(),
        "transformation finished"
    );

    let assessment = if config.stages.is_enabled(Stage::Risk) {
        let _span = info_span!("risk").entered();
        Oracle::standard().assess(&RiskContext {
            analysis,
            roles,
            changes: &transformation.changes,
        })
    } else {
        Assessment::default()
    };
    let report = Report::build(analysis, &transformation, &assessment);
    run.transformation = Some(transformation);
    run.assessment = Some(assessment);

    if !config.stages.is_enabled(Stage::Validation) {
        return Ok(true);
    }
    let _span = info_span!("validation", validator = validator.name()).entered();
    let verdict = validator
        .validate(workspace, &report)
        .with_context(|| format!("validator {}", validator.name()))?;
    if !verdict.passed {
        warn!(failures = verdict.failures.len(), "validation failed");
    }
    let passed = verdict.passed;
    run.verdict = Some(verdict);
    Ok(passed)
}

/// Runs the whole pipeline and writes reports.
///
/// Ingestion and analysis run inside the orchestrator, so a missing source
/// root or an analyzer panic discards the run like any other pipeline failure;
/// the report and the progress log are still written.
///
/// # Errors
/// Orchestrator I/O failures and report write failures only.
pub fn migrate(config: &MigrationConfig, validator: &dyn Validator) -> anyhow::Result<MigrationOutcome> {
    let mut run = WorkspaceRun::default();
    let mut state = None;
    let mut progress_path = None;
    let mut error = None;
    let mut diff = DiffCounts::default();

    if config.stages.is_enabled(Stage::Transformation) {
        let orchestrator = Orchestrator::new(&config.output_root, &config.state_dir())
            .incremental(config.incremental)
            .preview(config.is_preview());
        let outcome = orchestrator
            .run(|workspace| run_in_workspace(config, validator, workspace, &mut run))
            .context("orchestrating the migration run")?;
        state = Some(outcome.state);
        progress_path = Some(outcome.progress_path.clone());
        diff = DiffCounts::from_diff(&outcome.diff);
        error = outcome.error;
    } else {
        info!("transformation stage disabled, nothing to commit");
        match catch_unwind(AssertUnwindSafe(|| run.analyze(config))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error = Some(format!("analysis error: {:#}", e)),
            Err(panic) => error = Some(RuleFailure::from_panic("analysis", panic.as_ref()).message),
        }
        if let Some(reason) = &error {
            warn!(reason = %reason, "analysis failed");
        }
    }

    let analysis = run.analysis.unwrap_or_else(|| Analysis {
        root: config.source_root.clone(),
        ..Default::default()
    });
    let transformation = run.transformation.unwrap_or_default();
    let assessment = run.assessment.unwrap_or_default();
    let mut report = Report::build(&analysis, &transformation, &assessment);
    report.run.source_root = config.source_root.display().to_string();
    report.run.output_root = config.output_root.display().to_string();
    report.run.stages = config.stages.enabled_stages();
    report.run.rules = config
        .selected_rules()
        .iter()
        .map(|r| r.as_str().to_string())
        .collect();
    report.run.files = run.files;
    report.run.validation = run.verdict;
    report.run.state = state;
    report.run.error = error;
    report.run.diff = diff;

    let report_paths = if config.stages.is_enabled(Stage::Reporting) {
        let _span = info_span!("reporting").entered();
        report.write(&config.state_dir(), config.report_formats)?
    } else {
        Vec::new()
    };

    info!(
        state = %state.map(|s| s.to_string()).unwrap_or_else(|| "not run".into()),
        changes = report.changes.len(),
        manual = report.run.risk_totals.manual,
        "migration finished"
    );
    Ok(MigrationOutcome {
        report,
        state,
        progress_path,
        report_paths,
    })
}
