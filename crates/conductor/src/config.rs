//! Run configuration.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use forge::RuleKind;
use serde::{Deserialize, Serialize};

use crate::stages::StageController;

/// Directory name for reports and the progress log, under the source root.
pub const STATE_DIR_NAME: &str = ".transmute";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    Json,
    Markdown,
    #[default]
    Both,
}

impl ReportFormat {
    pub fn json(&self) -> bool {
        matches!(self, ReportFormat::Json | ReportFormat::Both)
    }

    pub fn markdown(&self) -> bool {
        matches!(self, ReportFormat::Markdown | ReportFormat::Both)
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            "both" => Ok(ReportFormat::Both),
            other => Err(format!("unknown report format '{}' (expected json, markdown or both)", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    pub source_root: PathBuf,
    pub output_root: PathBuf,
    /// Defaults to `<source_root>/.transmute`.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
    #[serde(default)]
    pub stages: StageController,
    /// Rule families to run; `None` runs all of them.
    #[serde(default)]
    pub rules: Option<Vec<RuleKind>>,
    #[serde(default)]
    pub dry_run: bool,
    /// Seed the workspace with the current output instead of starting empty.
    #[serde(default)]
    pub incremental: bool,
    #[serde(default)]
    pub report_formats: ReportFormat,
}

impl MigrationConfig {
    pub fn new(source_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            output_root: output_root.into(),
            state_dir: None,
            stages: StageController::all(),
            rules: None,
            dry_run: false,
            incremental: false,
            report_formats: ReportFormat::Both,
        }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.state_dir
            .clone()
            .unwrap_or_else(|| self.source_root.join(STATE_DIR_NAME))
    }

    pub fn progress_path(&self) -> PathBuf {
        self.state_dir().join("progress.json")
    }

    pub fn selected_rules(&self) -> &[RuleKind] {
        self.rules.as_deref().unwrap_or(&RuleKind::ALL[..])
    }

    /// Nothing reaches the final output: dry run, or no transformation stage.
    pub fn is_preview(&self) -> bool {
        self.dry_run || !self.stages.is_enabled(crate::Stage::Transformation)
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }
}

/// Parses a comma-separated rule list such as `controllers,http`.
pub fn parse_rule_list(list: &str) -> Result<Vec<RuleKind>, String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(RuleKind::from_str)
        .collect()
}
