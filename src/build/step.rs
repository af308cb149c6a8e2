//! Build steps and their execution.
//!
//! A step runs its pre-commands, fans its translation units out to the
//! compile workers, waits for all of them and finally links. Steps run
//! strictly one after another; only compilation inside a step is parallel.

use super::include::{IncludeSpec, SymlinkIncludeManager};
use super::link::LinkSpec;
use super::queue::WorkQueueSet;
use super::unit::{TranslationUnit, UnitRef};
use super::worker::{self, WorkerContext, WorkerStats};
use crate::config::Os;
use crate::error::{BuildError, BuildResult};
use crate::ide::CompileCommand;
use crate::paths::PathResolver;
use crate::process::{self, Command};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;

pub const DEFAULT_OUTPUT: &str = "main";

/// Link flags used when a step sets none of its own.
pub const DEFAULT_LINK_STANDARD: &str = "-std=c23";

#[derive(Debug, Default)]
pub struct BuildStep {
    pub(crate) name: Option<String>,
    pub(crate) pre_commands: Vec<Command>,
    pub(crate) includes: Vec<IncludeSpec>,
    pub(crate) units: Vec<TranslationUnit>,
    pub(crate) linked: Vec<UnitRef>,
    pub(crate) links: Vec<LinkSpec>,
    pub(crate) compile_flags: Vec<String>,
    pub(crate) link_flags: Vec<String>,
    pub(crate) compiler: Option<String>,
    pub(crate) output: Option<String>,
    pub(crate) skip_linking: bool,
}

impl BuildStep {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn units(&self) -> &[TranslationUnit] {
        &self.units
    }

    pub fn includes(&self) -> &[IncludeSpec] {
        &self.includes
    }

    pub fn links(&self) -> &[LinkSpec] {
        &self.links
    }

    pub fn compile_flags(&self) -> &[String] {
        &self.compile_flags
    }

    pub fn link_flags(&self) -> &[String] {
        &self.link_flags
    }

    pub fn pre_commands(&self) -> &[Command] {
        &self.pre_commands
    }

    pub fn output(&self) -> &str {
        self.output.as_deref().unwrap_or(DEFAULT_OUTPUT)
    }

    pub fn skips_linking(&self) -> bool {
        self.skip_linking
    }

    fn label(&self, index: usize) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("step {}", index + 1),
        }
    }
}

/// What one step did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    pub name: Option<String>,
    pub units: usize,
    pub compiled: usize,
    pub up_to_date: usize,
    /// Objects this step produced, in completion order.
    pub objects: Vec<PathBuf>,
    /// The linked artifact, unless linking was skipped.
    pub output: Option<PathBuf>,
}

/// Build-wide state shared by every step.
pub(crate) struct StepEnv<'a> {
    pub default_compiler: &'a str,
    pub build_dir: &'a Path,
    pub resolver: &'a PathResolver,
    pub symlinks: &'a SymlinkIncludeManager,
    pub os: Os,
    pub queues: &'a WorkQueueSet<usize>,
    pub compile_commands: &'a Mutex<Vec<CompileCommand>>,
}

fn progress_bar(len: usize) -> ProgressBar {
    // Command lines are the progress report when INFO is on.
    if log::log_enabled!(log::Level::Info) || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Run step `index` of `steps`. Earlier steps must already have run.
pub(crate) fn execute_step(env: &StepEnv<'_>, steps: &[BuildStep], index: usize) -> BuildResult<StepReport> {
    let step = &steps[index];
    let root = env.resolver.cwd();
    let compiler = step.compiler.as_deref().unwrap_or(env.default_compiler);

    log::debug!("Running {} ({} units)", step.label(index), step.units.len());

    for cmd in &step.pre_commands {
        let cmd = cmd.clone().or_dir(root);
        let code = process::run(&cmd)?;
        if code != 0 {
            return Err(BuildError::PreStepFailed {
                command: cmd.to_string(),
                code,
            });
        }
    }

    let includes = env.symlinks.include_args(&step.includes)?;
    env.queues.reset();

    let stats = compile_units(env, step, compiler, includes)?;

    let mut report = StepReport {
        name: step.name.clone(),
        units: step.units.len(),
        compiled: stats.compiled,
        up_to_date: stats.up_to_date,
        objects: stats.objects,
        output: None,
    };
    log::debug!(
        "{}: {} compiled, {} up to date",
        step.label(index),
        report.compiled,
        report.up_to_date
    );

    if step.skip_linking {
        return Ok(report);
    }

    let output = env.build_dir.join(step.output());
    let mut cmd = Command::in_dir(root, [compiler]);
    if step.link_flags.is_empty() {
        cmd.push(DEFAULT_LINK_STANDARD);
    } else {
        cmd.extend(step.link_flags.iter().cloned());
    }
    cmd.push("-o");
    cmd.push(output.to_string_lossy());
    cmd.extend(report.objects.iter().map(|o| o.to_string_lossy().into_owned()));

    for unit_ref in &step.linked {
        let unit = steps
            .get(unit_ref.step)
            .and_then(|s| s.units.get(unit_ref.index))
            .ok_or(BuildError::UnknownUnit {
                step: unit_ref.step,
                index: unit_ref.index,
            })?;
        let object = unit
            .object()
            .ok_or_else(|| BuildError::UnbuiltObject(unit.source().to_path_buf()))?;
        cmd.push(object.to_string_lossy());
    }

    for link in &step.links {
        cmd.extend(link.linker_args(env.os));
    }

    let code = process::run(&cmd)?;
    if code != 0 {
        return Err(BuildError::LinkFailed { output, code });
    }

    report.output = Some(output);
    Ok(report)
}

struct CompileStats {
    compiled: usize,
    up_to_date: usize,
    objects: Vec<PathBuf>,
}

fn compile_units(
    env: &StepEnv<'_>,
    step: &BuildStep,
    compiler: &str,
    includes: Vec<String>,
) -> BuildResult<CompileStats> {
    let object_files = Mutex::new(Vec::with_capacity(step.units.len()));
    let build_success = AtomicBool::new(true);
    let progress = progress_bar(step.units.len());

    let (queued, results) = thread::scope(|s| {
        let mut handles = Vec::with_capacity(env.queues.len());
        let mut spawned = Ok(());
        for (id, job) in env.queues.jobs().iter().enumerate() {
            let ctx = WorkerContext {
                units: &step.units,
                compiler,
                flags: &step.compile_flags,
                includes: includes.clone(),
                build_dir: env.build_dir,
                resolver: env.resolver,
                object_files: &object_files,
                compile_commands: env.compile_commands,
                build_success: &build_success,
                progress: &progress,
            };
            let worker = thread::Builder::new()
                .name(format!("compile-{}", id))
                .spawn_scoped(s, move || worker::compile_worker(job, &ctx));
            match worker {
                Ok(handle) => handles.push(handle),
                Err(error) => {
                    spawned = Err(BuildError::WorkerSpawn(error));
                    break;
                }
            }
        }

        let queued = spawned.and_then(|()| env.queues.distribute(0..step.units.len()));
        if queued.is_err() {
            build_success.store(false, Ordering::Release);
        }
        // Always raised so the workers can exit.
        env.queues.mark_all_queued();

        let results: Vec<BuildResult<WorkerStats>> = handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|_| Err(BuildError::WorkerPanicked)))
            .collect();
        (queued, results)
    });

    progress.finish_and_clear();
    queued?;

    let mut total = WorkerStats::default();
    for result in results {
        let stats = result?;
        total.compiled += stats.compiled;
        total.up_to_date += stats.up_to_date;
    }

    if !build_success.load(Ordering::Acquire) {
        return Err(BuildError::BuildFailed);
    }

    Ok(CompileStats {
        compiled: total.compiled,
        up_to_date: total.up_to_date,
        objects: object_files.into_inner().unwrap_or_else(PoisonError::into_inner),
    })
}
