//! Content-hash diff between two output trees.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::ShadowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileAction {
    Created,
    Updated,
    Unchanged,
    Removed,
}

impl FileAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileAction::Created => "created",
            FileAction::Updated => "updated",
            FileAction::Unchanged => "unchanged",
            FileAction::Removed => "removed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    /// Relative to the tree root, forward slashes.
    pub path: String,
    pub action: FileAction,
}

/// BLAKE3 hash of every file under `root`, keyed by relative path.
///
/// A missing root is an empty tree.
pub fn hash_tree(root: &Path) -> Result<BTreeMap<String, blake3::Hash>, ShadowError> {
    let mut hashes = BTreeMap::new();
    if !root.exists() {
        return Ok(hashes);
    }
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| ShadowError::IoError(io::Error::other(e)))?;
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        hashes.insert(key, blake3::hash(&fs::read(entry.path())?));
    }
    Ok(hashes)
}

/// Classifies every path of either tree, sorted by path.
pub fn diff_trees(
    before: &BTreeMap<String, blake3::Hash>,
    after: &BTreeMap<String, blake3::Hash>,
) -> Vec<FileDiff> {
    let mut diffs: Vec<FileDiff> = after
        .iter()
        .map(|(path, hash)| {
            let action = match before.get(path) {
                None => FileAction::Created,
                Some(old) if old == hash => FileAction::Unchanged,
                Some(_) => FileAction::Updated,
            };
            FileDiff {
                path: path.clone(),
                action,
            }
        })
        .collect();
    diffs.extend(
        before
            .keys()
            .filter(|path| !after.contains_key(*path))
            .map(|path| FileDiff {
                path: path.clone(),
                action: FileAction::Removed,
            }),
    );
    diffs.sort_by(|a, b| a.path.cmp(&b.path));
    diffs
}

/// Count per action, in `created, updated, unchanged, removed` order.
pub fn summarize(diffs: &[FileDiff]) -> [(FileAction, usize); 4] {
    [
        FileAction::Created,
        FileAction::Updated,
        FileAction::Unchanged,
        FileAction::Removed,
    ]
    .map(|action| (action, diffs.iter().filter(|d| d.action == action).count()))
}
