//! Leveled stderr logger.
//!
//! Routes `log` records to stderr with a coloured level tag. The level is taken
//! from `LOG_LEVEL` (`TRACE`, `DEBUG`, `INFO`, `WARN`, `ERROR`, `FATAL`) and
//! defaults to `INFO`. Setting `LOG_VERBOSE` to any value prefixes every line
//! with the emitting `file:line`.

use colored::*;
use log::{Level, LevelFilter, Metadata, Record};
use std::fmt::Display;
use std::io::Write;

/// Exit status used when a fatal error terminates the process.
pub const FATAL_EXIT_CODE: i32 = 404;

/// Records logged with this target are rendered with the `FATAL` tag.
pub const FATAL_TARGET: &str = "cbuild::fatal";

struct StderrLogger {
    verbose: bool,
    fatal_only: bool,
}

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        if self.fatal_only {
            return metadata.target() == FATAL_TARGET;
        }
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let tag = if record.target() == FATAL_TARGET {
            "[FATAL]".red().bold()
        } else {
            match record.level() {
                Level::Error => "[ERROR]".red(),
                Level::Warn => "[WARN]".yellow(),
                Level::Info => "[INFO]".green(),
                Level::Debug => "[DEBUG]".cyan(),
                Level::Trace => "[TRACE]".dimmed(),
            }
        };

        let mut stderr = std::io::stderr().lock();
        let _ = if self.verbose {
            writeln!(
                stderr,
                "{} {}:{}: {}",
                tag,
                record.file().unwrap_or("?"),
                record.line().unwrap_or(0),
                record.args()
            )
        } else {
            writeln!(stderr, "{} {}", tag, record.args())
        };
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Map a `LOG_LEVEL` value to a filter. `FATAL` is reported separately since
/// `log` has no level above `Error`.
pub fn parse_level(value: &str) -> (LevelFilter, bool) {
    match value.trim().to_ascii_uppercase().as_str() {
        "TRACE" => (LevelFilter::Trace, false),
        "DEBUG" => (LevelFilter::Debug, false),
        "INFO" => (LevelFilter::Info, false),
        "WARN" | "WARNING" => (LevelFilter::Warn, false),
        "ERROR" => (LevelFilter::Error, false),
        "FATAL" => (LevelFilter::Error, true),
        _ => (LevelFilter::Info, false),
    }
}

/// Install the logger. Calling this more than once is harmless.
pub fn init() {
    let (level, fatal_only) = std::env::var("LOG_LEVEL")
        .map(|v| parse_level(&v))
        .unwrap_or((LevelFilter::Info, false));
    let verbose = std::env::var_os("LOG_VERBOSE").is_some();

    let logger = Box::new(StderrLogger {
        verbose,
        fatal_only,
    });
    if log::set_boxed_logger(logger).is_ok() {
        log::set_max_level(level);
    }
}

/// Log `err` with the `FATAL` tag and terminate the process.
pub fn fatal(err: impl Display) -> ! {
    init();
    log::error!(target: FATAL_TARGET, "{}", err);
    log::logger().flush();
    std::process::exit(FATAL_EXIT_CODE);
}

/// Terminate through [`fatal`] instead of handling an error.
pub trait OrFatal<T> {
    fn or_fatal(self) -> T;
}

impl<T, E: Display> OrFatal<T> for Result<T, E> {
    fn or_fatal(self) -> T {
        match self {
            Ok(value) => value,
            Err(err) => fatal(err),
        }
    }
}
