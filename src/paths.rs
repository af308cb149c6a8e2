//! Path canonicalisation and object-path mirroring.
//!
//! Every path the build model stores goes through [`PathResolver::canonicalise`]
//! first, so nothing downstream ever sees a relative path. The small string
//! helpers at the bottom operate on the last `/` and the last `.` only.

use crate::error::{BuildError, BuildResult};
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Sources outside the root directory are mirrored beneath this directory.
pub const EXTERNAL_DIR: &str = "_external";

/// Resolves paths against a fixed root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    cwd: PathBuf,
}

impl PathResolver {
    /// A resolver anchored at the process working directory.
    pub fn current() -> BuildResult<Self> {
        let cwd = std::env::current_dir().map_err(BuildError::WorkingDirectory)?;
        Ok(Self::new(cwd))
    }

    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        let cwd = cwd.into();
        let cwd = fs::canonicalize(&cwd).unwrap_or_else(|_| normalize_lexically(&cwd));
        Self { cwd }
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Make `path` absolute and resolve it like `realpath`.
    ///
    /// A path that does not exist yet keeps its absolute form, with `.`/`..`
    /// removed and its deepest existing ancestor resolved.
    pub fn canonicalise(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        };

        match fs::canonicalize(&absolute) {
            Ok(resolved) => resolved,
            Err(_) => resolve_partially(&absolute),
        }
    }

    /// `path` relative to the root, or `None` when it lies outside it.
    pub fn relative_to_cwd(&self, path: &Path) -> Option<PathBuf> {
        path.strip_prefix(&self.cwd)
            .ok()
            .filter(|rel| !rel.as_os_str().is_empty())
            .map(Path::to_path_buf)
    }

    /// Location of `source` inside a mirror tree.
    ///
    /// Sources outside the root keep their whole absolute path under
    /// [`EXTERNAL_DIR`], so distinct sources never share a location. A drive or
    /// UNC prefix becomes an ordinary directory name. No `..` is produced.
    pub fn mirror_relative(&self, source: &Path) -> PathBuf {
        if let Some(rel) = self.relative_to_cwd(source) {
            return rel;
        }

        let mut mirrored = PathBuf::from(EXTERNAL_DIR);
        for component in source.components() {
            match component {
                Component::Prefix(prefix) => mirrored.push(sanitize_prefix(prefix.as_os_str())),
                Component::Normal(name) => mirrored.push(name),
                Component::RootDir | Component::CurDir | Component::ParentDir => {}
            }
        }
        mirrored
    }

    /// Object path for `source` beneath `build_dir`, with its parent created.
    pub fn mirror_under(&self, build_dir: &Path, source: &Path) -> BuildResult<PathBuf> {
        let mirrored = build_dir.join(self.mirror_relative(source));
        let object = PathBuf::from(replace_extension(&mirrored.to_string_lossy(), "o"));

        if let Some(parent) = object.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }
        Ok(object)
    }
}

// `C:` -> `C_`, `\\server\share` -> `__server_share`
fn sanitize_prefix(prefix: &OsStr) -> OsString {
    prefix
        .to_string_lossy()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .into()
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

fn resolve_partially(absolute: &Path) -> PathBuf {
    let normal = normalize_lexically(absolute);
    let mut existing = normal.as_path();
    let mut missing = Vec::new();

    loop {
        if let Ok(resolved) = fs::canonicalize(existing) {
            let mut out = resolved;
            for name in missing.iter().rev() {
                out.push(name);
            }
            return out;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return normal,
        }
    }
}

/// Everything after the last `/`.
pub fn extract_filename(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

/// Everything before the last `.`.
pub fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(i) => &name[..i],
        None => name,
    }
}

/// Swap the extension of the final component, appending one if missing.
pub fn replace_extension(path: &str, new_ext: &str) -> String {
    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[name_start..].rfind('.') {
        Some(i) => format!("{}.{}", &path[..name_start + i], new_ext),
        None => format!("{}.{}", path, new_ext),
    }
}

/// Everything before the last `/`.
pub fn parent_directory(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(i) => &path[..i],
        None => "",
    }
}
