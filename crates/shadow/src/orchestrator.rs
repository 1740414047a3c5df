//! The run loop: workspace → pipeline → commit or discard → progress log.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::diff::{diff_trees, hash_tree, summarize, FileDiff};
use crate::progress::ProgressLog;
use crate::workspace::Workspace;
use crate::ShadowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Committed,
    Discarded,
    /// Dry run: the workspace was diffed and thrown away on purpose.
    Previewed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Committed => "committed",
            RunState::Discarded => "discarded",
            RunState::Previewed => "previewed",
        })
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub state: RunState,
    /// Previous final output vs. the workspace, sorted by path.
    pub diff: Vec<FileDiff>,
    /// Why the run was discarded: validation, pipeline error or panic.
    pub error: Option<String>,
    pub progress_path: PathBuf,
}

impl RunOutcome {
    pub fn committed(&self) -> bool {
        self.state == RunState::Committed
    }
}

/// Executes pipelines against a final output directory.
///
/// Concurrent runs get distinct workspaces; concurrent commits to the same
/// output root are not serialized here.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    output_root: PathBuf,
    progress_path: PathBuf,
    incremental: bool,
    preview: bool,
}

impl Orchestrator {
    pub fn new(output_root: &Path, state_dir: &Path) -> Self {
        Self {
            output_root: output_root.to_path_buf(),
            progress_path: state_dir.join("progress.json"),
            incremental: false,
            preview: false,
        }
    }

    /// Seed each workspace with the current output.
    pub fn incremental(mut self, on: bool) -> Self {
        self.incremental = on;
        self
    }

    /// Never commit; log the would-be diff.
    pub fn preview(mut self, on: bool) -> Self {
        self.preview = on;
        self
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn progress_path(&self) -> &Path {
        &self.progress_path
    }

    /// Runs `pipeline` with a fresh workspace as its output root.
    ///
    /// `Ok(true)` commits. `Ok(false)`, `Err` and panics all discard and
    /// leave the final output untouched. The progress log is written in every
    /// case.
    ///
    /// # Errors
    /// Only when the workspace cannot be allocated, the current output cannot
    /// be hashed, or the log cannot be written.
    pub fn run<F>(&self, pipeline: F) -> Result<RunOutcome, ShadowError>
    where
        F: FnOnce(&Path) -> anyhow::Result<bool>,
    {
        let before = hash_tree(&self.output_root)?;
        let workspace = Workspace::allocate(&self.output_root, self.incremental)?;
        info!(
            from = %RunState::Idle,
            to = %RunState::Running,
            workspace = %workspace.path().display(),
            "orchestrator transition"
        );

        let outcome = catch_unwind(AssertUnwindSafe(|| pipeline(workspace.path())));
        let mut error = match outcome {
            Ok(Ok(true)) => None,
            Ok(Ok(false)) => Some("validation failed".to_string()),
            Ok(Err(e)) => Some(format!("pipeline error: {:#}", e)),
            Err(panic) => Some(format!("pipeline panicked: {}", panic_text(panic.as_ref()))),
        };

        let after = match hash_tree(workspace.path()) {
            Ok(hashes) => hashes,
            Err(e) if error.is_some() => {
                warn!(error = %e, "failed workspace could not be hashed");
                Default::default()
            }
            Err(e) => return Err(e),
        };
        let diff = diff_trees(&before, &after);

        let state = if error.is_some() {
            RunState::Discarded
        } else if self.preview {
            RunState::Previewed
        } else {
            match workspace.commit() {
                Ok(()) => RunState::Committed,
                Err(e) => {
                    error = Some(e.to_string());
                    RunState::Discarded
                }
            }
        };

        match &error {
            Some(reason) => error!(
                from = %RunState::Running,
                to = %state,
                reason = %reason,
                "orchestrator transition, final output untouched"
            ),
            None => info!(from = %RunState::Running, to = %state, "orchestrator transition"),
        }
        let [created, updated, unchanged, removed] = summarize(&diff).map(|(_, n)| n);
        info!(created, updated, unchanged, removed, "output diff");

        ProgressLog::from_diff(&diff, state == RunState::Discarded).save(&self.progress_path)?;
        Ok(RunOutcome {
            state,
            diff,
            error,
            progress_path: self.progress_path.clone(),
        })
    }
}

fn panic_text(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::FileAction;
    use std::fs;

    fn setup() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let state = dir.path().join("state");
        fs::create_dir_all(out.join("src")).unwrap();
        fs::write(out.join("src/existing.ts"), "v1").unwrap();
        (dir, out, state)
    }

    fn write_outputs(root: &Path) -> anyhow::Result<()> {
        fs::create_dir_all(root.join("src"))?;
        fs::write(root.join("src/existing.ts"), "v2")?;
        fs::write(root.join("src/new.ts"), "new")?;
        Ok(())
    }

    #[test]
    fn test_commit_swaps_and_logs_diff() {
        let (_dir, out, state) = setup();
        let outcome = Orchestrator::new(&out, &state)
            .run(|ws| {
                write_outputs(ws)?;
                Ok(true)
            })
            .unwrap();

        assert_eq!(outcome.state, RunState::Committed);
        assert_eq!(fs::read_to_string(out.join("src/existing.ts")).unwrap(), "v2");
        let log = ProgressLog::load(&outcome.progress_path).unwrap();
        let actions: Vec<_> = log.entries.iter().map(|e| (e.path.as_str(), e.action)).collect();
        assert_eq!(
            actions,
            vec![
                ("src/existing.ts", FileAction::Updated),
                ("src/new.ts", FileAction::Created),
            ]
        );
        assert!(log.entries.iter().all(|e| !e.rolled_back));
    }

    #[test]
    fn test_failed_validation_leaves_output_untouched() {
        let (_dir, out, state) = setup();
        let before = hash_tree(&out).unwrap();
        let outcome = Orchestrator::new(&out, &state)
            .run(|ws| {
                write_outputs(ws)?;
                Ok(false)
            })
            .unwrap();

        assert_eq!(outcome.state, RunState::Discarded);
        assert_eq!(outcome.error.as_deref(), Some("validation failed"));
        assert_eq!(hash_tree(&out).unwrap(), before);
        let log = ProgressLog::load(&outcome.progress_path).unwrap();
        assert!(!log.entries.is_empty());
        assert!(log.entries.iter().all(|e| e.rolled_back));
    }

    #[test]
    fn test_panic_and_error_roll_back() {
        let (dir, out, state) = setup();
        let before = hash_tree(&out).unwrap();
        let orchestrator = Orchestrator::new(&out, &state);

        let panicked = orchestrator
            .run(|ws| {
                write_outputs(ws)?;
                panic!("rule engine exploded");
            })
            .unwrap();
        assert_eq!(panicked.state, RunState::Discarded);
        assert!(panicked.error.unwrap().contains("rule engine exploded"));

        let failed = orchestrator
            .run(|_| Err(anyhow::anyhow!("analysis failed")))
            .unwrap();
        assert_eq!(failed.state, RunState::Discarded);
        assert!(failed.error.unwrap().contains("analysis failed"));

        assert_eq!(hash_tree(&out).unwrap(), before);
        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().all(|n| !n.contains(".shadow-")), "{:?}", names);
    }

    #[test]
    fn test_preview_and_incremental() {
        let (_dir, out, state) = setup();
        let preview = Orchestrator::new(&out, &state)
            .preview(true)
            .incremental(true)
            .run(|ws| {
                assert_eq!(fs::read_to_string(ws.join("src/existing.ts")).unwrap(), "v1");
                fs::write(ws.join("src/new.ts"), "new")?;
                Ok(true)
            })
            .unwrap();
        assert_eq!(preview.state, RunState::Previewed);
        assert!(!out.join("src/new.ts").exists());
        let actions: Vec<_> = preview.diff.iter().map(|d| d.action).collect();
        assert_eq!(actions, vec![FileAction::Unchanged, FileAction::Created]);

        let fresh = Orchestrator::new(&out, &state)
            .run(|ws| {
                fs::write(ws.join("only.ts"), "x")?;
                Ok(true)
            })
            .unwrap();
        assert!(fresh.committed());
        assert!(!out.join("src/existing.ts").exists());
        assert!(fresh
            .diff
            .iter()
            .any(|d| d.path == "src/existing.ts" && d.action == FileAction::Removed));
    }
}
