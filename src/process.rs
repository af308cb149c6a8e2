//! Command model and process execution.
//!
//! Every external tool the driver launches (compilers, linkers, `ln`, pre-step
//! commands, the rebuilt driver itself) goes through [`run`] or
//! [`run_captured`]. Commands are joined with single spaces and handed to the
//! platform shell, so a single token may carry several shell words.
//!
//! Children are spawned with an explicit working directory instead of changing
//! the directory of the whole process, which keeps concurrent workers from
//! stepping on each other.

use crate::error::{BuildError, BuildResult};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Stdio;

/// An ordered list of argument tokens plus an optional working directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    args: Vec<String>,
    dir: Option<PathBuf>,
}

impl Command {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            dir: None,
        }
    }

    /// A command executed from `dir` rather than the build root.
    pub fn in_dir<I, S>(dir: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dir: Some(dir.into()),
            ..Self::new(args)
        }
    }

    pub fn push(&mut self, arg: impl Into<String>) {
        self.args.push(arg.into());
    }

    pub fn extend<I, S>(&mut self, args: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn set_dir(&mut self, dir: impl Into<PathBuf>) {
        self.dir = Some(dir.into());
    }

    /// Set the working directory only if none was given.
    pub fn or_dir(mut self, dir: &Path) -> Self {
        if self.dir.is_none() {
            self.dir = Some(dir.to_path_buf());
        }
        self
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.args.join(" "))
    }
}

/// Combined stdout and stderr of a finished child.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
    pub output: String,
    pub exit_code: i32,
}

fn shell(line: &str) -> std::process::Command {
    if cfg!(target_os = "windows") {
        let mut cmd = std::process::Command::new("cmd");
        cmd.args(["/C", line]);
        cmd
    } else {
        let mut cmd = std::process::Command::new("sh");
        cmd.args(["-c", line]);
        cmd
    }
}

fn exit_code(status: std::process::ExitStatus) -> i32 {
    // Killed by a signal: no code, report a generic failure.
    status.code().unwrap_or(-1)
}

/// Run `cmd` through the shell and return its exit status.
pub fn run(cmd: &Command) -> BuildResult<i32> {
    let line = cmd.to_string();
    log::info!("{}", line);

    let mut child = shell(&line);
    if let Some(dir) = cmd.dir() {
        child.current_dir(dir);
    }

    let status = child.status().map_err(|error| BuildError::Spawn {
        command: line.clone(),
        error,
    })?;
    Ok(exit_code(status))
}

/// Drain `source` to EOF in small chunks.
fn read_all(mut source: impl Read) -> std::io::Result<Vec<u8>> {
    let mut raw = Vec::new();
    let mut chunk = [0u8; 128];
    loop {
        match source.read(&mut chunk) {
            Ok(0) => return Ok(raw),
            Ok(n) => raw.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Run `cmd` with stderr folded into stdout and collect everything it prints.
///
/// Both streams share one pipe, so output from every command of a compound
/// line is kept, in the order the child wrote it.
pub fn run_captured(cmd: &Command) -> BuildResult<Captured> {
    let line = cmd.to_string();
    log::debug!("{}", line);

    let spawn_err = |error| BuildError::Spawn {
        command: line.clone(),
        error,
    };

    let (reader, writer) = std::io::pipe().map_err(spawn_err)?;
    let mut child = {
        let mut child = shell(&line);
        if let Some(dir) = cmd.dir() {
            child.current_dir(dir);
        }
        let stderr = writer.try_clone().map_err(spawn_err)?;
        child.stdout(writer).stderr(stderr).stdin(Stdio::null());
        // The builder owns our copies of the write end; it must be gone
        // before reading or EOF never arrives.
        child.spawn().map_err(spawn_err)?
    };

    let raw = read_all(reader);
    let status = child.wait().map_err(spawn_err)?;
    let raw = raw.map_err(|error| BuildError::Capture {
        command: line.clone(),
        error,
    })?;

    Ok(Captured {
        output: String::from_utf8_lossy(&raw).into_owned(),
        exit_code: exit_code(status),
    })
}
