//! Validation boundary: a pass/fail verdict on the finished workspace.
//!
//! The pipeline only sees the verdict. How it was produced (test runner,
//! snapshot comparison, a build) is the validator's business.

use std::path::Path;
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::report::Report;

/// Lines of captured output kept in a failed verdict.
const OUTPUT_TAIL: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    pub failures: Vec<String>,
}

impl Verdict {
    pub fn pass() -> Self {
        Self {
            passed: true,
            failures: Vec::new(),
        }
    }

    pub fn fail(failures: Vec<String>) -> Self {
        Self {
            passed: false,
            failures,
        }
    }
}

pub trait Validator {
    fn name(&self) -> &str;

    /// Judges the generated workspace. An `Err` is a pipeline-fatal error,
    /// not a failed verdict.
    fn validate(&self, workspace: &Path, report: &Report) -> anyhow::Result<Verdict>;
}

/// Always passes.
pub struct AcceptAll;

impl Validator for AcceptAll {
    fn name(&self) -> &str {
        "accept-all"
    }

    fn validate(&self, _workspace: &Path, _report: &Report) -> anyhow::Result<Verdict> {
        Ok(Verdict::pass())
    }
}

/// Runs a command inside the workspace; exit status zero passes.
#[derive(Debug, Clone)]
pub struct CommandValidator {
    program: String,
    args: Vec<String>,
}

impl CommandValidator {
    /// Splits a command line on whitespace. `None` for a blank line.
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

fn tail(bytes: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(bytes);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(OUTPUT_TAIL);
    lines[start..].iter().map(|l| l.to_string()).collect()
}

impl Validator for CommandValidator {
    fn name(&self) -> &str {
        &self.program
    }

    fn validate(&self, workspace: &Path, _report: &Report) -> anyhow::Result<Verdict> {
        debug!(program = %self.program, args = ?self.args, "running validation command");
        let output = match Command::new(&self.program)
            .args(&self.args)
            .current_dir(workspace)
            .output()
        {
            Ok(output) => output,
            Err(e) => {
                warn!(program = %self.program, error = %e, "validation command could not start");
                return Ok(Verdict::fail(vec![format!(
                    "failed to spawn {}: {}",
                    self.program, e
                )]));
            }
        };
        if output.status.success() {
            return Ok(Verdict::pass());
        }
        let mut failures = vec![format!(
            "{} exited with code {}",
            self.program,
            output.status.code().unwrap_or(-1)
        )];
        failures.extend(tail(&output.stderr));
        failures.extend(tail(&output.stdout));
        Ok(Verdict::fail(failures))
    }
}
