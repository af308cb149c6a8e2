use super::deps;
use super::queue::BuildJob;
use super::unit::TranslationUnit;
use crate::error::{BuildError, BuildResult};
use crate::ide::CompileCommand;
use crate::paths::PathResolver;
use crate::process::{self, Command};
use indicatif::ProgressBar;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// Shared state a compile worker needs for one step.
pub(crate) struct WorkerContext<'a> {
    pub units: &'a [TranslationUnit],
    pub compiler: &'a str,
    pub flags: &'a [String],
    pub includes: Vec<String>,
    pub build_dir: &'a Path,
    pub resolver: &'a PathResolver,
    pub object_files: &'a Mutex<Vec<PathBuf>>,
    pub compile_commands: &'a Mutex<Vec<CompileCommand>>,
    pub build_success: &'a AtomicBool,
    pub progress: &'a ProgressBar,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub compiled: usize,
    pub up_to_date: usize,
}

fn append<T>(list: &Mutex<Vec<T>>, item: T) {
    list.lock().unwrap_or_else(PoisonError::into_inner).push(item);
}

/// Drain `job` until it is empty and the producer has finished queueing.
///
/// Stops early once any worker in the step has failed.
pub(crate) fn compile_worker(job: &BuildJob<usize>, ctx: &WorkerContext<'_>) -> BuildResult<WorkerStats> {
    let mut stats = WorkerStats::default();

    let result = loop {
        if !ctx.build_success.load(Ordering::Acquire) {
            break Ok(());
        }

        // Read the flag before popping: every push happens before it is set.
        let queued = job.all_queued();
        match job.pop() {
            Some(index) => match compile_unit(&ctx.units[index], ctx) {
                Ok(true) => stats.compiled += 1,
                Ok(false) => stats.up_to_date += 1,
                Err(e) => {
                    ctx.build_success.store(false, Ordering::Release);
                    break Err(e);
                }
            },
            None if queued => break Ok(()),
            None => std::thread::yield_now(),
        }
    };

    job.mark_all_complete();
    result.map(|()| stats)
}

/// Compile one unit if it is stale. Returns whether the compiler ran.
fn compile_unit(unit: &TranslationUnit, ctx: &WorkerContext<'_>) -> BuildResult<bool> {
    let root = ctx.resolver.cwd();

    let (record, probe_code) =
        deps::probe_dependencies(ctx.compiler, ctx.flags, &ctx.includes, unit.source(), root)?;

    let object = ctx.resolver.mirror_under(ctx.build_dir, unit.source())?;
    let source_arg = ctx
        .resolver
        .relative_to_cwd(unit.source())
        .unwrap_or_else(|| unit.source().to_path_buf());

    let mut cmd = Command::in_dir(root, [ctx.compiler]);
    cmd.extend(ctx.flags.iter().cloned());
    cmd.extend(ctx.includes.iter().cloned());
    cmd.push("-c");
    cmd.push(source_arg.to_string_lossy());
    cmd.push("-o");
    cmd.push(object.to_string_lossy());
    unit.set_object(object.clone());

    append(
        ctx.compile_commands,
        CompileCommand::new(root, &cmd, unit.source()),
    );

    let dependencies = record.dependencies.iter().map(|dep| root.join(dep));
    let stale = probe_code != 0 || deps::needs_rebuild(&object, dependencies);

    // The link needs every object, rebuilt or not.
    append(ctx.object_files, object.clone());

    if !stale {
        log::debug!("{} is up to date", unit.filename());
        ctx.progress.inc(1);
        return Ok(false);
    }

    ctx.progress.set_message(unit.filename().to_string());
    let code = process::run(&cmd)?;
    if code != 0 {
        // Never leave a partial object behind for the next run to trust.
        let _ = fs::remove_file(&object);
        log::error!("Object file build failed: {}", unit.source().display());
        return Err(BuildError::CompileFailed {
            file: unit.source().to_path_buf(),
            code,
        });
    }

    ctx.progress.inc(1);
    Ok(true)
}
