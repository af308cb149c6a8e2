use crate::error::BuildResult;
use crate::paths::{self, PathResolver};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// One source file compiled into one object file.
#[derive(Debug)]
pub struct TranslationUnit {
    source: PathBuf,
    filename: String,
    stem: String,
    // Set by the worker that compiles this unit in the current run.
    object: OnceLock<PathBuf>,
}

impl TranslationUnit {
    /// A unit for `path`, resolved against the process working directory.
    pub fn new(path: impl AsRef<Path>) -> BuildResult<Self> {
        Ok(Self::resolved(&PathResolver::current()?, path))
    }

    pub fn resolved(resolver: &PathResolver, path: impl AsRef<Path>) -> Self {
        Self::from_absolute(resolver.canonicalise(path))
    }

    fn from_absolute(source: PathBuf) -> Self {
        let lossy = source.to_string_lossy();
        let filename = paths::extract_filename(&lossy).to_string();
        let stem = paths::strip_extension(&filename).to_string();
        Self {
            source,
            filename,
            stem,
            object: OnceLock::new(),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn filename_no_ext(&self) -> &str {
        &self.stem
    }

    /// The object path, once compilation has been attempted this run.
    pub fn object(&self) -> Option<&Path> {
        self.object.get().map(PathBuf::as_path)
    }

    pub(crate) fn set_object(&self, object: PathBuf) {
        let _ = self.object.set(object);
    }

    pub(crate) fn reset_object(&mut self) {
        self.object.take();
    }
}

/// Handle to a unit added to some build step, used to link its object later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitRef {
    pub(crate) step: usize,
    pub(crate) index: usize,
}

impl UnitRef {
    pub fn step(&self) -> usize {
        self.step
    }
}
