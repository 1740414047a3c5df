//! Relative, forward-slash paths for facts and generated files.

use std::path::Path;

/// Path of `path` relative to `root`, forward slashes.
///
/// Every fact carries this form so that reports do not depend on where the
/// source tree happens to be checked out. Falls back to the lossy full path
/// when `path` is not under `root`.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    dunce::simplified(rel)
        .to_string_lossy()
        .replace('\\', "/")
}

/// File stem with every extension removed: `app/user.controller.js` → `user`.
pub fn bare_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.split('.').next().unwrap_or(name)
}
