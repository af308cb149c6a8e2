//! Build driver error types.
//!
//! Every fallible operation in the library returns [`BuildResult`]. Driver
//! programs usually terminate on the first error through
//! [`crate::logger::fatal`].

use std::collections::TryReserveError;
use std::path::PathBuf;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Cannot determine the working directory: {0}")]
    WorkingDirectory(#[source] std::io::Error),

    #[error("I/O error at {path}: {error}")]
    Io {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("Failed to spawn `{command}`: {error}")]
    Spawn {
        command: String,
        error: std::io::Error,
    },

    #[error("Failed to read the output of `{command}`: {error}")]
    Capture {
        command: String,
        error: std::io::Error,
    },

    #[error("Failed to start a compile worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("Refusing to clean {dir}: it contains the project root {root}")]
    UnsafeClean { dir: PathBuf, root: PathBuf },

    #[error("Invalid include name `{0}`: expected a single path component")]
    InvalidLogicalName(String),

    #[error("Missing value after -j")]
    MissingJobs,

    #[error("{0} is not a valid number of jobs")]
    InvalidJobs(String),

    #[error("Number of jobs out of range: {0}")]
    JobsOutOfRange(String),

    #[error("Driver source not found: {0}")]
    MissingDriverSource(PathBuf),

    #[error("Build system rebuild failed with exit code {0}")]
    RebuildFailed(i32),

    #[error("Rebuilt driver exited with code {0}")]
    ReexecFailed(i32),

    #[error("Pre-step command `{command}` failed with exit code {code}")]
    PreStepFailed { command: String, code: i32 },

    #[error("Object file build failed for {file} (exit code {code})")]
    CompileFailed { file: PathBuf, code: i32 },

    #[error("Linking {output} failed with exit code {code}")]
    LinkFailed { output: PathBuf, code: i32 },

    #[error("Cannot link {0}: it was never compiled")]
    UnbuiltObject(PathBuf),

    #[error("No unit {index} in step {step}")]
    UnknownUnit { step: usize, index: usize },

    #[error("Failed to link {link} -> {target} (exit code {code})")]
    Symlink {
        link: PathBuf,
        target: PathBuf,
        code: i32,
    },

    #[error("Work queue allocation failed: {0}")]
    QueueAllocation(#[from] TryReserveError),

    #[error("Failed to serialise compile commands: {0}")]
    CompileDatabase(#[from] serde_json::Error),

    #[error("A compile worker panicked")]
    WorkerPanicked,

    #[error("Build failed")]
    BuildFailed,

    #[error("Failed to read manifest at {path}: {error}")]
    Manifest { path: PathBuf, error: String },
}

impl BuildError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            error,
        }
    }

    pub fn manifest(path: impl Into<PathBuf>, error: impl ToString) -> Self {
        Self::Manifest {
            path: path.into(),
            error: error.to_string(),
        }
    }
}
