//! Build settings and the `cbuild.toml` manifest.

use crate::build::Bootstrap;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const DEFAULT_COMPILER: &str = "clang";
pub const DEFAULT_BUILD_DIR: &str = ".build";
pub const MANIFEST_FILE: &str = "cbuild.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    Debug,
    #[default]
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    Linux,
    MacOS,
    Windows,
    Invalid,
}

impl Os {
    pub fn detect() -> Self {
        if cfg!(target_os = "linux") {
            Os::Linux
        } else if cfg!(target_os = "macos") {
            Os::MacOS
        } else if cfg!(target_os = "windows") {
            Os::Windows
        } else {
            Os::Invalid
        }
    }
}

/// Everything needed to construct a [`crate::build::Build`].
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub build_dir: PathBuf,
    pub compiler: String,
    /// Driver arguments, `argv[0]` included.
    pub args: Vec<String>,
    /// Directory relative paths are resolved against. Defaults to the
    /// process working directory.
    pub root_dir: Option<PathBuf>,
    /// Self-rebuild check performed during construction, if any.
    pub bootstrap: Option<Bootstrap>,
}

impl BuildConfig {
    pub fn new(build_dir: impl Into<PathBuf>) -> Self {
        Self {
            build_dir: build_dir.into(),
            compiler: DEFAULT_COMPILER.to_string(),
            args: Vec::new(),
            root_dir: None,
            bootstrap: None,
        }
    }

    pub fn with_compiler(mut self, compiler: impl Into<String>) -> Self {
        self.compiler = compiler.into();
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(root.into());
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: Bootstrap) -> Self {
        self.bootstrap = Some(bootstrap);
        self
    }
}

// --- Manifest ---

#[derive(Deserialize, Debug)]
pub struct Manifest {
    #[serde(default = "default_build_dir")]
    pub build_dir: String,
    pub compiler: Option<String>,
    #[serde(default = "default_true")]
    pub compile_commands: bool,
    #[serde(default, rename = "step")]
    pub steps: Vec<StepConfig>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct StepConfig {
    pub name: Option<String>,
    pub compiler: Option<String>,
    pub output: Option<String>,
    pub skip_linking: bool,
    /// Shell command lines run before compiling.
    pub pre: Vec<String>,
    pub sources: Vec<String>,
    pub source_dirs: Vec<String>,
    pub includes: Vec<String>,
    /// Logical name -> real directory.
    pub symbolic_includes: BTreeMap<String, String>,
    pub flags: Vec<String>,
    pub debug_flags: Vec<String>,
    pub release_flags: Vec<String>,
    pub link_flags: Vec<String>,
    pub libs: Vec<String>,
    pub lib_paths: Vec<LibPath>,
    pub link_files: Vec<String>,
    pub frameworks: Vec<String>,
    /// Sources compiled by an earlier step whose objects are linked here.
    pub link_sources: Vec<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct LibPath {
    pub dir: String,
    pub lib: String,
}

fn default_build_dir() -> String {
    DEFAULT_BUILD_DIR.to_string()
}

fn default_true() -> bool {
    true
}
