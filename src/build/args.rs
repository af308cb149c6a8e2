use crate::config::Mode;
use crate::error::{BuildError, BuildResult};
use std::num::IntErrorKind;

/// Options understood by every driver program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverArgs {
    pub mode: Mode,
    pub jobs: usize,
}

impl Default for DriverArgs {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            jobs: 1,
        }
    }
}

/// Scan `args` for `-Debug`, `-Release` and `-j N`. Anything else is ignored.
///
/// The worker count is clamped to at least one; a value that is not a base-10
/// integer, or does not fit, is an error.
pub fn parse_args<S: AsRef<str>>(args: &[S]) -> BuildResult<DriverArgs> {
    let mut parsed = DriverArgs::default();

    let mut iter = args.iter().map(AsRef::as_ref);
    while let Some(arg) = iter.next() {
        match arg {
            "-Debug" => parsed.mode = Mode::Debug,
            "-Release" => parsed.mode = Mode::Release,
            "-j" => {
                let value = iter.next().ok_or(BuildError::MissingJobs)?;
                parsed.jobs = parse_jobs(value)?;
            }
            _ => {}
        }
    }

    Ok(parsed)
}

fn parse_jobs(value: &str) -> BuildResult<usize> {
    let jobs = value.parse::<i64>().map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
            BuildError::JobsOutOfRange(value.to_string())
        }
        _ => BuildError::InvalidJobs(value.to_string()),
    })?;

    usize::try_from(jobs.max(1)).map_err(|_| BuildError::JobsOutOfRange(value.to_string()))
}
