//! Progress log: one entry per output path per run.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::diff::{FileAction, FileDiff};
use crate::ShadowError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub path: String,
    pub action: FileAction,
    /// The change was computed but discarded with its workspace.
    pub rolled_back: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressLog {
    pub entries: Vec<ProgressEntry>,
}

impl ProgressLog {
    pub fn from_diff(diffs: &[FileDiff], rolled_back: bool) -> Self {
        let timestamp = Utc::now();
        Self {
            entries: diffs
                .iter()
                .map(|d| ProgressEntry {
                    path: d.path.clone(),
                    action: d.action,
                    rolled_back,
                    timestamp,
                })
                .collect(),
        }
    }

    /// Writes the log as a JSON array, replacing any previous run's log.
    pub fn save(&self, path: &Path) -> Result<(), ShadowError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ShadowError> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }
}
