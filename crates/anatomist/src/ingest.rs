//! Source ingestion: walk, classify, read.

use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::AnatomistError;

/// Directory names never descended into.
const EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "dist",
    "build",
    "bower_components",
    "__pycache__",
    "target",
    ".transmute",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Script,
    Markup,
    /// Pass-through: carried along, never analyzed.
    Other,
}

/// Classifies a path by extension. Type declarations and vendor bundles are `Other`.
pub fn classify(path: &Path) -> FileKind {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if name.ends_with(".d.ts") || is_vendor_bundle(&name) {
        return FileKind::Other;
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some("js") | Some("ts") => FileKind::Script,
        Some("html") | Some("htm") => FileKind::Markup,
        _ => FileKind::Other,
    }
}

fn is_vendor_bundle(lower_name: &str) -> bool {
    lower_name.ends_with(".min.js") || (lower_name.starts_with("angular") && lower_name.ends_with(".js"))
}

fn is_excluded(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| EXCLUDED_DIRS.contains(&n))
}

/// Classified file set of one source root. Paths are absolute and sorted.
#[derive(Debug, Clone, Default)]
pub struct SourceSet {
    pub root: PathBuf,
    pub scripts: Vec<PathBuf>,
    pub markup: Vec<PathBuf>,
    pub other: Vec<PathBuf>,
}

impl SourceSet {
    pub fn len(&self) -> usize {
        self.scripts.len() + self.markup.len() + self.other.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Walks `root` in file-name order and classifies every regular file.
///
/// # Errors
/// `IoError` if `root` cannot be canonicalized, `WalkError` on traversal failure.
pub fn scan(root: &Path) -> Result<SourceSet, AnatomistError> {
    let root = dunce::canonicalize(root)?;
    let mut set = SourceSet {
        root: root.clone(),
        ..Default::default()
    };

    for entry in WalkDir::new(&root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_excluded(e.path()))
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        match classify(&path) {
            FileKind::Script => set.scripts.push(path),
            FileKind::Markup => set.markup.push(path),
            FileKind::Other => set.other.push(path),
        }
    }

    info!(
        scripts = set.scripts.len(),
        markup = set.markup.len(),
        other = set.other.len(),
        "ingested source tree"
    );
    Ok(set)
}

/// Maps a file read-only. `Ok(None)` for empty files.
///
/// # Errors
/// `IoError` on open/mmap failure, `ByteRangeOverflow` past tree-sitter's u32 limit.
pub fn map_file(path: &Path) -> Result<Option<Mmap>, AnatomistError> {
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    if len > u32::MAX as u64 {
        return Err(AnatomistError::ByteRangeOverflow);
    }
    if len == 0 {
        debug!(path = %path.display(), "skipping empty file");
        return Ok(None);
    }
    // SAFETY: The file handle is held for the duration of the mmap lifetime.
    let mmap = unsafe { MmapOptions::new().map(&file)? };
    Ok(Some(mmap))
}
