use crate::config::Os;
use crate::paths::PathResolver;
use std::path::PathBuf;

/// A library or file handed to the linker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkSpec {
    /// `-l<lib>`
    Direct { lib: String },
    /// `-L<dir> -l<lib>`
    Path { dir: PathBuf, lib: String },
    /// A library or object file passed literally.
    PathDirect { file: PathBuf },
    /// `-framework <name>`, macOS only.
    Framework { name: String },
}

impl LinkSpec {
    pub fn direct(lib: impl Into<String>) -> Self {
        Self::Direct { lib: lib.into() }
    }

    pub fn path(dir: impl Into<PathBuf>, lib: impl Into<String>) -> Self {
        Self::Path {
            dir: dir.into(),
            lib: lib.into(),
        }
    }

    pub fn file(file: impl Into<PathBuf>) -> Self {
        Self::PathDirect { file: file.into() }
    }

    pub fn framework(name: impl Into<String>) -> Self {
        Self::Framework { name: name.into() }
    }

    pub(crate) fn canonicalised(self, resolver: &PathResolver) -> Self {
        match self {
            Self::Path { dir, lib } => Self::Path {
                dir: resolver.canonicalise(dir),
                lib,
            },
            Self::PathDirect { file } => Self::PathDirect {
                file: resolver.canonicalise(file),
            },
            other => other,
        }
    }

    /// Linker arguments on `os`. Frameworks vanish off macOS.
    pub fn linker_args(&self, os: Os) -> Vec<String> {
        match self {
            Self::Direct { lib } => vec![format!("-l{}", lib)],
            Self::Path { dir, lib } => {
                vec![format!("-L{}", dir.display()), format!("-l{}", lib)]
            }
            Self::PathDirect { file } => vec![file.to_string_lossy().into_owned()],
            Self::Framework { name } if os == Os::MacOS => {
                vec!["-framework".to_string(), name.clone()]
            }
            Self::Framework { .. } => Vec::new(),
        }
    }
}
