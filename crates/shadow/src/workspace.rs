//! Private per-run workspace next to the final output directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::ShadowError;

/// A uniquely named sibling of the final output root.
///
/// Lives on the same filesystem as the output, so committing is a rename.
/// Dropping an uncommitted workspace deletes it.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    final_root: PathBuf,
    committed: bool,
}

impl Workspace {
    /// Allocates `.<name>.shadow-<uuid>` next to `final_root`. With `seed`,
    /// the current output (if any) is copied in first.
    pub fn allocate(final_root: &Path, seed: bool) -> Result<Self, ShadowError> {
        let (parent, name) = split_root(final_root)?;
        fs::create_dir_all(&parent)?;
        let parent = dunce::canonicalize(&parent)?;
        let path = parent.join(format!(".{}.shadow-{}", name, Uuid::new_v4().simple()));
        fs::create_dir(&path)?;

        let workspace = Self {
            path,
            final_root: parent.join(&name),
            committed: false,
        };
        if seed && workspace.final_root.is_dir() {
            copy_tree(&workspace.final_root, &workspace.path)?;
        }
        debug!(workspace = %workspace.path.display(), seeded = seed, "workspace allocated");
        Ok(workspace)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn final_root(&self) -> &Path {
        &self.final_root
    }

    /// Replaces the final output with this workspace.
    ///
    /// The old output is renamed aside, the workspace renamed in, then the old
    /// tree removed. If the second step fails the old tree goes back.
    pub fn commit(mut self) -> Result<(), ShadowError> {
        let aside = self.final_root.with_file_name(format!(
            ".{}.old-{}",
            file_name(&self.final_root),
            Uuid::new_v4().simple()
        ));
        let had_output = self.final_root.exists();
        if had_output {
            fs::rename(&self.final_root, &aside)?;
        }

        if let Err(e) = move_tree(&self.path, &self.final_root) {
            // Drop any partial copy before putting the old tree back.
            if self.final_root.exists() {
                if let Err(cleanup) = fs::remove_dir_all(&self.final_root) {
                    warn!(path = %self.final_root.display(), error = %cleanup, "partial output not removed");
                }
            }
            if had_output {
                fs::rename(&aside, &self.final_root)?;
            }
            return Err(ShadowError::CommitFailed {
                path: self.final_root.display().to_string(),
                reason: e.to_string(),
            });
        }
        self.committed = true;

        if had_output {
            if let Err(e) = fs::remove_dir_all(&aside) {
                warn!(path = %aside.display(), error = %e, "previous output left behind");
            }
        }
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.committed && self.path.exists() {
            if let Err(e) = fs::remove_dir_all(&self.path) {
                warn!(workspace = %self.path.display(), error = %e, "workspace cleanup failed");
            }
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn split_root(final_root: &Path) -> Result<(PathBuf, String), ShadowError> {
    let name = file_name(final_root);
    if name.is_empty() || name == ".." {
        return Err(ShadowError::InvalidRoot(final_root.display().to_string()));
    }
    let parent = match final_root.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((parent, name))
}

/// Rename, falling back to copy + delete across devices.
fn move_tree(from: &Path, to: &Path) -> io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    copy_tree(from, to).map_err(|e| io::Error::other(e.to_string()))?;
    fs::remove_dir_all(from)
}

/// Recursively copies the contents of `from` into `to`.
pub fn copy_tree(from: &Path, to: &Path) -> Result<(), ShadowError> {
    fs::create_dir_all(to)?;
    for entry in WalkDir::new(from).min_depth(1) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| ShadowError::IoError(io::Error::other(e)))?;
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uncommitted_workspace_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let path = {
            let ws = Workspace::allocate(&out, false).unwrap();
            assert!(ws.path().is_dir());
            assert!(ws
                .path()
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with(".out.shadow-"));
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
        assert!(!out.exists());
    }

    #[test]
    fn test_commit_replaces_output_without_merging() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        fs::create_dir_all(out.join("old")).unwrap();
        fs::write(out.join("old/stale.ts"), "stale").unwrap();
        fs::write(out.join("keep.ts"), "v1").unwrap();

        let ws = Workspace::allocate(&out, false).unwrap();
        fs::write(ws.path().join("keep.ts"), "v2").unwrap();
        ws.commit().unwrap();

        assert_eq!(fs::read_to_string(out.join("keep.ts")).unwrap(), "v2");
        assert!(!out.join("old").exists());
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_failed_move_restores_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("keep.ts"), "v1").unwrap();

        let ws = Workspace::allocate(&out, false).unwrap();
        fs::remove_dir_all(ws.path()).unwrap();
        let err = ws.commit().unwrap_err();
        assert!(matches!(err, ShadowError::CommitFailed { .. }));

        assert_eq!(fs::read_to_string(out.join("keep.ts")).unwrap(), "v1");
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_seeded_workspace_starts_from_current_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        fs::create_dir_all(out.join("src/app")).unwrap();
        fs::write(out.join("src/app/app.module.ts"), "module").unwrap();

        let ws = Workspace::allocate(&out, true).unwrap();
        assert_eq!(
            fs::read_to_string(ws.path().join("src/app/app.module.ts")).unwrap(),
            "module"
        );
    }

    #[test]
    fn test_invalid_root() {
        assert!(matches!(
            Workspace::allocate(Path::new("/"), false),
            Err(ShadowError::InvalidRoot(_))
        ));
    }
}
