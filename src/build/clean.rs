//! Build artifact cleanup.
//!
//! Removes the build directory (objects, outputs and `sym_links`) and the
//! compile database written next to the build root.

use super::core::COMPILE_COMMANDS_FILE;
use crate::error::{BuildError, BuildResult};
use crate::paths::PathResolver;
use std::fs;
use std::path::Path;

/// Remove everything a build under `root` produced. Returns whether anything
/// was there to remove.
///
/// A `build_dir` that resolves to `root` or one of its ancestors is refused.
pub fn clean(root: &Path, build_dir: &Path) -> BuildResult<bool> {
    let mut cleaned = false;

    let resolver = PathResolver::new(root);
    let build_dir = resolver.canonicalise(build_dir);
    if resolver.cwd().starts_with(&build_dir) {
        return Err(BuildError::UnsafeClean {
            dir: build_dir,
            root: resolver.cwd().to_path_buf(),
        });
    }

    if build_dir.exists() {
        fs::remove_dir_all(&build_dir).map_err(|e| BuildError::io(&build_dir, e))?;
        log::info!("Removed {}", build_dir.display());
        cleaned = true;
    }

    let database = resolver.cwd().join(COMPILE_COMMANDS_FILE);
    if database.exists() {
        fs::remove_file(&database).map_err(|e| BuildError::io(&database, e))?;
        log::info!("Removed {}", database.display());
        cleaned = true;
    }

    Ok(cleaned)
}
