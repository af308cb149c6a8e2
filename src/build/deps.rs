//! Header dependency discovery and object staleness.
//!
//! Dependencies come from the compiler's `-MM` mode, which prints a single
//! Make rule (`target: dep dep \` with line continuations). An object is fresh
//! only if every dependency is at least one second older than it.

use crate::error::BuildResult;
use crate::process::{self, Command};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Slack applied to dependency timestamps before comparing them to the object.
pub const MTIME_GRACE: Duration = Duration::from_secs(1);

/// A parsed `-MM` rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyRecord {
    pub target: String,
    pub dependencies: Vec<String>,
}

impl DependencyRecord {
    pub fn is_empty(&self) -> bool {
        self.target.is_empty() && self.dependencies.is_empty()
    }
}

/// Parse the output of `<compiler> -MM`.
///
/// Backslashes and newlines are dropped, the text is split at the first `:`,
/// and the remainder is split on runs of spaces and tabs. No quoting is
/// interpreted. Output without a colon yields an empty record.
pub fn parse_dependency_output(output: &str) -> DependencyRecord {
    let flat: String = output.chars().filter(|c| *c != '\\' && *c != '\n').collect();

    let Some((target, rest)) = flat.split_once(':') else {
        return DependencyRecord::default();
    };

    DependencyRecord {
        target: target.to_string(),
        dependencies: rest
            .split([' ', '\t'])
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

/// Ask `compiler` for the dependencies of `source`.
///
/// Returns the parsed record together with the probe's exit code; callers
/// treat a failed probe as "must rebuild" so the compiler gets to report the
/// actual error.
pub fn probe_dependencies(
    compiler: &str,
    flags: &[String],
    includes: &[String],
    source: &Path,
    dir: &Path,
) -> BuildResult<(DependencyRecord, i32)> {
    let mut cmd = Command::in_dir(dir, [compiler]);
    cmd.extend(flags.iter().cloned());
    cmd.extend(includes.iter().cloned());
    cmd.push("-MM");
    cmd.push(source.to_string_lossy());

    let captured = process::run_captured(&cmd)?;
    if captured.output.trim().is_empty() {
        return Ok((DependencyRecord::default(), captured.exit_code));
    }
    Ok((parse_dependency_output(&captured.output), captured.exit_code))
}

/// Whether `object` has to be rebuilt given its dependencies.
///
/// A missing object or a missing dependency always forces a rebuild.
pub fn needs_rebuild<I, P>(object: &Path, dependencies: I) -> bool
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let Ok(object_time) = fs::metadata(object).and_then(|m| m.modified()) else {
        return true;
    };

    for dep in dependencies {
        match fs::metadata(dep.as_ref()).and_then(|m| m.modified()) {
            Ok(dep_time) => {
                if dep_time + MTIME_GRACE > object_time {
                    log::debug!(
                        "{} is newer than {}",
                        dep.as_ref().display(),
                        object.display()
                    );
                    return true;
                }
            }
            Err(_) => return true,
        }
    }

    false
}
