mod args;
mod bootstrap;
mod clean;
mod core;
mod deps;
mod include;
mod link;
mod queue;
mod step;
mod unit;
mod utils;
mod worker;

pub use args::{DriverArgs, parse_args};
pub use bootstrap::Bootstrap;
pub use clean::clean;
pub use core::{Build, BuildReport, COMPILE_COMMANDS_FILE, SOURCE_EXTENSIONS, SYM_LINK_DIR};
pub use deps::{DependencyRecord, MTIME_GRACE, needs_rebuild, parse_dependency_output, probe_dependencies};
pub use include::{IncludeSpec, SymlinkIncludeManager};
pub use link::LinkSpec;
pub use queue::{BuildJob, INITIAL_CAPACITY, RingQueue, WorkQueueSet};
pub use step::{BuildStep, DEFAULT_LINK_STANDARD, DEFAULT_OUTPUT, StepReport};
pub use unit::{TranslationUnit, UnitRef};
pub use utils::{configure_from_manifest, load_manifest};
pub use worker::WorkerStats;
