//! # Shadow: Atomic Output Orchestration
//!
//! **Role**: Runs one pipeline inside a private workspace and makes its output
//! visible all at once, or not at all.
//!
//! **State machine**: `Idle → Running → Committed | Discarded` (plus
//! `Previewed` for dry runs, which never touch the final output).
//!
//! **Modules**:
//! - [`workspace`]: uniquely named sibling directory, removed on drop unless
//!   swapped into place.
//! - [`diff`]: BLAKE3 content hashes over sorted paths, classified per file.
//! - [`progress`]: the persisted progress log.
//! - [`orchestrator`]: the run loop tying them together.

pub mod diff;
pub mod orchestrator;
pub mod progress;
pub mod workspace;

pub use diff::{diff_trees, hash_tree, FileAction, FileDiff};
pub use orchestrator::{Orchestrator, RunOutcome, RunState};
pub use progress::{ProgressEntry, ProgressLog};
pub use workspace::Workspace;

/// Errors from workspace and commit operations.
#[derive(Debug, thiserror::Error)]
pub enum ShadowError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Walk error: {0}")]
    WalkError(#[from] walkdir::Error),

    #[error("Progress log error: {0}")]
    LogError(#[from] serde_json::Error),

    /// The output path has no parent or no file name to derive a sibling from.
    #[error("Invalid output root: {0}")]
    InvalidRoot(String),

    /// The swap failed; the previous output was restored.
    #[error("Commit failed for {path}: {reason}")]
    CommitFailed { path: String, reason: String },
}
