//! `compile_commands.json` generation for clangd and other IDE tooling.
//!
//! One record per compiled source, written as a tab-indented JSON array.

use crate::error::{BuildError, BuildResult};
use crate::process::Command;
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompileCommand {
    pub directory: PathBuf,
    pub command: String,
    pub file: PathBuf,
}

impl CompileCommand {
    pub fn new(directory: &Path, command: &Command, file: &Path) -> Self {
        Self {
            directory: directory.to_path_buf(),
            command: command.to_string(),
            file: file.to_path_buf(),
        }
    }
}

/// Render `entries` as the on-disk database, trailing newline included.
pub fn render_compile_commands(entries: &[CompileCommand]) -> BuildResult<String> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"\t"));
    entries.serialize(&mut ser)?;

    let mut json = String::from_utf8_lossy(&buf).into_owned();
    json.push('\n');
    Ok(json)
}

pub fn write_compile_commands(path: &Path, entries: &[CompileCommand]) -> BuildResult<()> {
    let json = render_compile_commands(entries)?;
    fs::write(path, json).map_err(|e| BuildError::io(path, e))?;
    log::debug!("Wrote {} compile commands to {}", entries.len(), path.display());
    Ok(())
}

pub fn load_compile_commands(path: &Path) -> BuildResult<Vec<CompileCommand>> {
    let content = fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
    Ok(serde_json::from_str(&content)?)
}
