use super::args::{DriverArgs, parse_args};
use super::bootstrap::Bootstrap;
use super::include::{IncludeSpec, SymlinkIncludeManager};
use super::link::LinkSpec;
use super::queue::WorkQueueSet;
use super::step::{self, BuildStep, StepEnv, StepReport};
use super::unit::{TranslationUnit, UnitRef};
use crate::config::{BuildConfig, Mode, Os};
use crate::error::{BuildError, BuildResult};
use crate::ide::{self, CompileCommand};
use crate::paths::PathResolver;
use crate::process::Command;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use walkdir::WalkDir;

pub const SYM_LINK_DIR: &str = "sym_links";
pub const COMPILE_COMMANDS_FILE: &str = "compile_commands.json";

/// Extensions picked up by [`Build::add_sources_from`].
pub const SOURCE_EXTENSIONS: &[&str] = &["c", "cc", "cpp", "cxx"];

/// Outcome of [`Build::build`].
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub steps: Vec<StepReport>,
    pub compile_commands: Vec<CompileCommand>,
}

impl BuildReport {
    pub fn compiled(&self) -> usize {
        self.steps.iter().map(|s| s.compiled).sum()
    }

    pub fn up_to_date(&self) -> usize {
        self.steps.iter().map(|s| s.up_to_date).sum()
    }
}

/// The build controller.
///
/// Holds an ordered list of steps. Configuration methods always act on the
/// newest step; [`Build::step`] seals it and opens the next one.
#[derive(Debug)]
pub struct Build {
    resolver: PathResolver,
    build_dir: PathBuf,
    symlinks: SymlinkIncludeManager,
    compiler: String,
    mode: Mode,
    os: Os,
    jobs: usize,
    args: Vec<String>,
    write_compile_commands: bool,
    steps: Vec<BuildStep>,
}

impl Build {
    /// A build using the default compiler that self-rebuilds from `build.c`.
    pub fn new<I, S>(build_dir: impl Into<PathBuf>, args: I) -> BuildResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_config(
            BuildConfig::new(build_dir)
                .with_args(args)
                .with_bootstrap(Bootstrap::c_driver()),
        )
    }

    pub fn with_compiler<I, S>(
        build_dir: impl Into<PathBuf>,
        compiler: impl Into<String>,
        args: I,
    ) -> BuildResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_config(
            BuildConfig::new(build_dir)
                .with_compiler(compiler)
                .with_args(args)
                .with_bootstrap(Bootstrap::c_driver()),
        )
    }

    /// Create the build directory layout, parse the driver arguments and run
    /// the bootstrap check, if any. May not return when the driver rebuilds
    /// itself.
    pub fn from_config(config: BuildConfig) -> BuildResult<Self> {
        let resolver = match config.root_dir {
            Some(root) => PathResolver::new(root),
            None => PathResolver::current()?,
        };

        let build_dir = resolver.canonicalise(&config.build_dir);
        let sym_link_dir = build_dir.join(SYM_LINK_DIR);
        fs::create_dir_all(&sym_link_dir).map_err(|e| BuildError::io(&sym_link_dir, e))?;

        let DriverArgs { mode, jobs } = parse_args(&config.args)?;
        let os = Os::detect();
        log::debug!(
            "Build in {} ({:?}, {:?}, {} jobs)",
            build_dir.display(),
            mode,
            os,
            jobs
        );

        let build = Self {
            symlinks: SymlinkIncludeManager::new(sym_link_dir),
            resolver,
            build_dir,
            compiler: config.compiler,
            mode,
            os,
            jobs,
            args: config.args,
            write_compile_commands: true,
            steps: vec![BuildStep::default()],
        };

        if let Some(bootstrap) = &config.bootstrap {
            bootstrap.run(build.resolver.cwd(), &build.compiler, mode, &build.args)?;
        }

        Ok(build)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn os(&self) -> Os {
        self.os
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    pub fn compiler(&self) -> &str {
        &self.compiler
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    pub fn sym_link_dir(&self) -> &Path {
        self.symlinks.root()
    }

    /// The directory relative paths resolve against and children run in.
    pub fn root(&self) -> &Path {
        self.resolver.cwd()
    }

    pub fn steps(&self) -> &[BuildStep] {
        &self.steps
    }

    pub fn unit(&self, unit: UnitRef) -> Option<&TranslationUnit> {
        self.steps.get(unit.step)?.units.get(unit.index)
    }

    /// `path` made absolute against the build root.
    pub fn canonicalise(&self, path: impl AsRef<Path>) -> PathBuf {
        self.resolver.canonicalise(path)
    }

    fn current(&mut self) -> &mut BuildStep {
        if self.steps.is_empty() {
            self.steps.push(BuildStep::default());
        }
        let last = self.steps.len() - 1;
        &mut self.steps[last]
    }

    fn current_index(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    /// Seal the current step and start a new, empty one.
    pub fn step(&mut self) {
        self.steps.push(BuildStep::default());
    }

    pub fn set_step_name(&mut self, name: impl Into<String>) {
        self.current().name = Some(name.into());
    }

    /// Run `cmd` before the current step compiles. Without a directory of its
    /// own it runs in the build root.
    pub fn add_pre_step_command(&mut self, mut cmd: Command) {
        let dir = match cmd.dir() {
            Some(dir) => self.resolver.canonicalise(dir),
            None => self.resolver.cwd().to_path_buf(),
        };
        cmd.set_dir(dir);
        self.current().pre_commands.push(cmd);
    }

    pub fn add_source(&mut self, path: impl AsRef<Path>) -> UnitRef {
        let unit = TranslationUnit::resolved(&self.resolver, path);
        self.add_unit(unit)
    }

    pub fn add_unit(&mut self, unit: TranslationUnit) -> UnitRef {
        let step = self.current_index();
        let units = &mut self.current().units;
        units.push(unit);
        UnitRef {
            step,
            index: units.len() - 1,
        }
    }

    /// Add every C/C++ source below `dir`, in file-name order.
    pub fn add_sources_from(&mut self, dir: impl AsRef<Path>) -> Vec<UnitRef> {
        let dir = self.resolver.canonicalise(dir);
        let sources: Vec<PathBuf> = WalkDir::new(&dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| {
                p.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
            })
            .collect();

        if sources.is_empty() {
            log::warn!("No sources found in {}", dir.display());
        }
        sources.into_iter().map(|p| self.add_source(p)).collect()
    }

    pub fn add_include(&mut self, include: IncludeSpec) {
        let include = include.canonicalised(&self.resolver);
        self.current().includes.push(include);
    }

    pub fn add_link(&mut self, link: LinkSpec) {
        let link = link.canonicalised(&self.resolver);
        self.current().links.push(link);
    }

    /// Link the object of a unit compiled by an earlier step.
    pub fn link_unit(&mut self, unit: UnitRef) {
        self.current().linked.push(unit);
    }

    pub fn add_compilation_flag(&mut self, flag: impl Into<String>) {
        self.current().compile_flags.push(flag.into());
    }

    pub fn add_linking_flag(&mut self, flag: impl Into<String>) {
        self.current().link_flags.push(flag.into());
    }

    /// Compiler for the current step only.
    pub fn set_compiler(&mut self, compiler: impl Into<String>) {
        self.current().compiler = Some(compiler.into());
    }

    pub fn set_output_file(&mut self, name: impl Into<String>) {
        self.current().output = Some(name.into());
    }

    pub fn skip_linking(&mut self) {
        self.current().skip_linking = true;
    }

    /// Do not write `compile_commands.json` after the build.
    pub fn skip_compile_commands(&mut self) {
        self.write_compile_commands = false;
    }

    pub fn compile_commands_path(&self) -> PathBuf {
        self.resolver.cwd().join(COMPILE_COMMANDS_FILE)
    }

    /// Compile threads per step: `-j`, but never more than the largest step
    /// has units.
    pub fn worker_count(&self) -> usize {
        let widest = self.steps.iter().map(|s| s.units.len()).max().unwrap_or(0);
        self.jobs.min(widest).max(1)
    }

    /// Run every step in order, then write the compile database.
    ///
    /// Stops at the first failing step. Object paths recorded by a previous
    /// call are forgotten first, so linking against a unit that has not been
    /// compiled in this run fails.
    pub fn build(&mut self) -> BuildResult<BuildReport> {
        for step in &mut self.steps {
            step.units.iter_mut().for_each(TranslationUnit::reset_object);
        }

        let queues = WorkQueueSet::new(self.worker_count())?;
        let compile_commands = Mutex::new(Vec::new());
        let env = StepEnv {
            default_compiler: &self.compiler,
            build_dir: &self.build_dir,
            resolver: &self.resolver,
            symlinks: &self.symlinks,
            os: self.os,
            queues: &queues,
            compile_commands: &compile_commands,
        };

        let mut steps = Vec::with_capacity(self.steps.len());
        for index in 0..self.steps.len() {
            steps.push(step::execute_step(&env, &self.steps, index)?);
        }

        let compile_commands = compile_commands
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        if self.write_compile_commands {
            ide::write_compile_commands(&self.compile_commands_path(), &compile_commands)?;
        }

        Ok(BuildReport {
            steps,
            compile_commands,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_in(dir: &Path, args: &[&str]) -> Build {
        Build::from_config(
            BuildConfig::new(".build")
                .with_root(dir)
                .with_args(args.iter().copied()),
        )
        .unwrap()
    }

    #[test]
    fn test_construction_creates_sym_links() {
        let dir = tempfile::tempdir().unwrap();
        let build = build_in(dir.path(), &["./build", "-Debug", "-j", "3"]);

        assert!(build.sym_link_dir().is_dir());
        assert!(build.build_dir().is_absolute());
        assert_eq!(build.mode(), Mode::Debug);
        assert_eq!(build.jobs(), 3);
        assert_eq!(build.compiler(), "clang");
        assert_eq!(build.steps().len(), 1);
    }

    #[test]
    fn test_workers_capped_by_units() {
        let dir = tempfile::tempdir().unwrap();
        let mut build = build_in(dir.path(), &["./build", "-j", "200000"]);
        assert_eq!(build.jobs(), 200000);
        assert_eq!(build.worker_count(), 1);

        build.add_source("a.c");
        build.add_source("b.c");
        build.step();
        build.add_source("c.c");
        assert_eq!(build.worker_count(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_huge_job_count_on_empty_build() {
        let dir = tempfile::tempdir().unwrap();
        let mut build = build_in(dir.path(), &["./build", "-j", "200000"]);
        build.skip_linking();
        build.skip_compile_commands();

        let report = build.build().unwrap();
        assert_eq!(report.compiled(), 0);
        assert_eq!(report.steps[0].units, 0);
    }

    #[test]
    fn test_bad_jobs_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = Build::from_config(
            BuildConfig::new(".build")
                .with_root(dir.path())
                .with_args(["./build", "-j", "lots"]),
        );
        assert!(matches!(result, Err(BuildError::InvalidJobs(_))));
    }

    #[test]
    fn test_configuration_targets_newest_step() {
        let dir = tempfile::tempdir().unwrap();
        let mut build = build_in(dir.path(), &["./build"]);

        let util = build.add_source("src/util.c");
        build.skip_linking();
        build.step();
        build.add_source("src/main.c");
        build.link_unit(util);
        build.set_output_file("app");
        build.add_compilation_flag("-Wall");

        let steps = build.steps();
        assert_eq!(steps.len(), 2);
        assert!(steps[0].skips_linking());
        assert!(steps[0].compile_flags().is_empty());
        assert_eq!(steps[1].output(), "app");
        assert_eq!(steps[1].compile_flags(), ["-Wall"]);
        assert_eq!(util.step(), 0);
        assert!(steps[1].units()[0].source().is_absolute());
    }

    #[test]
    fn test_pre_step_command_defaults_to_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut build = build_in(dir.path(), &["./build"]);
        build.add_pre_step_command(Command::new(["true"]));
        build.add_pre_step_command(Command::in_dir("gen", ["true"]));

        let cmds = build.steps()[0].pre_commands();
        assert_eq!(cmds[0].dir(), Some(build.root()));
        assert_eq!(cmds[1].dir(), Some(build.root().join("gen").as_path()));
    }

    #[test]
    fn test_add_sources_from_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        for name in ["b.c", "a.cpp", "notes.txt", "nested/c.cc", "header.h"] {
            fs::write(src.join(name), "").unwrap();
        }

        let mut build = build_in(dir.path(), &["./build"]);
        let added = build.add_sources_from("src");
        assert_eq!(added.len(), 3);

        let names: Vec<_> = build.steps()[0]
            .units()
            .iter()
            .map(|u| u.filename().to_string())
            .collect();
        assert_eq!(names, ["a.cpp", "b.c", "c.cc"]);
    }

    #[test]
    fn test_empty_build_without_linking_writes_empty_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut build = build_in(dir.path(), &["./build", "-j", "4"]);
        build.skip_linking();

        let report = build.build().unwrap();
        assert_eq!(report.compiled(), 0);
        let written = fs::read_to_string(build.compile_commands_path()).unwrap();
        assert_eq!(written, "[]\n");
    }
}
