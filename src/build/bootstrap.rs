//! Self-rebuild of the driver executable.
//!
//! A driver compiled from `build.c`/`build.h` checks on startup whether its own
//! sources are newer than its binary. If so it recompiles itself, runs the new
//! binary with the same arguments and exits, so user steps only ever run from
//! an up-to-date driver.

use crate::config::Mode;
use crate::error::{BuildError, BuildResult};
use crate::process::{self, Command};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bootstrap {
    sources: Vec<PathBuf>,
    executable: PathBuf,
    command: Option<Command>,
}

impl Bootstrap {
    /// The conventional C driver: `build.c` + `build.h` compiled to `build`.
    pub fn c_driver() -> Self {
        let executable = if cfg!(target_os = "windows") {
            "build.exe"
        } else {
            "build"
        };
        Self::new(["build.c", "build.h"], executable)
    }

    /// A driver whose first source is the one handed to the compiler.
    pub fn new<I, P>(sources: I, executable: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            sources: sources.into_iter().map(Into::into).collect(),
            executable: executable.into(),
            command: None,
        }
    }

    /// Rebuild with `command` instead of invoking the build's compiler.
    pub fn with_command(mut self, command: Command) -> Self {
        self.command = Some(command);
        self
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Whether any driver source is newer than the executable, or the
    /// executable is missing. A missing source is an error.
    pub fn needs_rebuild(&self, root: &Path) -> BuildResult<bool> {
        let mut newest_source = SystemTime::UNIX_EPOCH;
        for source in &self.sources {
            let path = root.join(source);
            let modified = fs::metadata(&path)
                .and_then(|m| m.modified())
                .map_err(|_| BuildError::MissingDriverSource(path.clone()))?;
            newest_source = newest_source.max(modified);
        }

        match fs::metadata(root.join(&self.executable)).and_then(|m| m.modified()) {
            Ok(exe_time) => Ok(newest_source > exe_time),
            Err(_) => Ok(true),
        }
    }

    pub fn compile_command(&self, compiler: &str, mode: Mode) -> Command {
        if let Some(command) = &self.command {
            return command.clone();
        }

        let mut cmd = Command::new([compiler, "-std=c23"]);
        if mode == Mode::Debug {
            cmd.extend(["-g", "-O0", "-fsanitize=address"]);
        }
        if let Some(main_source) = self.sources.first() {
            cmd.push(main_source.to_string_lossy());
        }
        cmd.push("-o");
        cmd.push(self.executable.to_string_lossy());
        cmd
    }

    pub fn rebuild(&self, root: &Path, compiler: &str, mode: Mode) -> BuildResult<()> {
        log::info!("Rebuilding build system...");
        let cmd = self.compile_command(compiler, mode).or_dir(root);
        let code = process::run(&cmd)?;
        if code != 0 {
            return Err(BuildError::RebuildFailed(code));
        }
        Ok(())
    }

    /// Run the rebuilt executable with `args[1..]`.
    pub fn reexec(&self, root: &Path, args: &[String]) -> BuildResult<()> {
        let program = if self.executable.is_absolute() {
            self.executable.to_string_lossy().into_owned()
        } else if cfg!(target_os = "windows") {
            format!(".\\{}", self.executable.display())
        } else {
            format!("./{}", self.executable.display())
        };

        let mut cmd = Command::in_dir(root, [program]);
        cmd.extend(args.iter().skip(1).cloned());

        let code = process::run(&cmd)?;
        if code != 0 {
            return Err(BuildError::ReexecFailed(code));
        }
        Ok(())
    }

    /// Rebuild and run the new driver when the current one is stale.
    ///
    /// Returns whether the new driver ran (and succeeded).
    pub fn refresh(&self, root: &Path, compiler: &str, mode: Mode, args: &[String]) -> BuildResult<bool> {
        if !self.needs_rebuild(root)? {
            return Ok(false);
        }

        self.rebuild(root, compiler, mode)?;
        self.reexec(root, args)?;
        Ok(true)
    }

    /// Rebuild and hand over to the new driver if needed.
    ///
    /// Returns normally when the driver is up to date. After a successful
    /// hand-over the current process exits with status 0.
    pub fn run(&self, root: &Path, compiler: &str, mode: Mode, args: &[String]) -> BuildResult<()> {
        if self.refresh(root, compiler, mode, args)? {
            std::process::exit(0);
        }
        Ok(())
    }
}

impl Default for Bootstrap {
    fn default() -> Self {
        Self::c_driver()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn write_at(path: &Path, contents: &str, time: SystemTime) {
        fs::write(path, contents).unwrap();
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    #[test]
    fn test_missing_source_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Bootstrap::c_driver().needs_rebuild(dir.path());
        assert!(matches!(result, Err(BuildError::MissingDriverSource(_))));
    }

    #[test]
    fn test_missing_executable_needs_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let now = SystemTime::now();
        write_at(&dir.path().join("build.c"), "", now);
        write_at(&dir.path().join("build.h"), "", now);

        assert!(Bootstrap::c_driver().needs_rebuild(dir.path()).unwrap());
    }

    #[test]
    fn test_newer_source_needs_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let now = SystemTime::now();
        let bootstrap = Bootstrap::new(["build.c", "build.h"], "build");
        write_at(&dir.path().join("build.c"), "", now - Duration::from_secs(60));
        write_at(&dir.path().join("build"), "", now - Duration::from_secs(30));
        write_at(&dir.path().join("build.h"), "", now);

        assert!(bootstrap.needs_rebuild(dir.path()).unwrap());
    }

    #[test]
    fn test_up_to_date_driver() {
        let dir = tempfile::tempdir().unwrap();
        let now = SystemTime::now();
        let bootstrap = Bootstrap::new(["build.c", "build.h"], "build");
        write_at(&dir.path().join("build.c"), "", now - Duration::from_secs(60));
        write_at(&dir.path().join("build.h"), "", now - Duration::from_secs(60));
        write_at(&dir.path().join("build"), "", now);

        assert!(!bootstrap.needs_rebuild(dir.path()).unwrap());
        // Up to date: run() returns instead of exiting.
        bootstrap
            .run(dir.path(), "cc", Mode::Release, &["./build".to_string()])
            .unwrap();
    }

    #[test]
    fn test_compile_command_modes() {
        let bootstrap = Bootstrap::new(["build.c", "build.h"], "build");
        assert_eq!(
            bootstrap.compile_command("clang", Mode::Release).to_string(),
            "clang -std=c23 build.c -o build"
        );
        assert_eq!(
            bootstrap.compile_command("clang", Mode::Debug).to_string(),
            "clang -std=c23 -g -O0 -fsanitize=address build.c -o build"
        );
    }

    #[test]
    fn test_custom_command() {
        let bootstrap = Bootstrap::new(["driver.rs"], "driver")
            .with_command(Command::new(["rustc", "driver.rs", "-o", "driver"]));
        assert_eq!(
            bootstrap.compile_command("clang", Mode::Debug).to_string(),
            "rustc driver.rs -o driver"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_reexec_forwards_argument_tail() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("build");
        fs::write(&script, "#!/bin/sh\necho \"$@\" > args.txt\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let args: Vec<String> = ["./build", "-Debug", "-j", "4"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        Bootstrap::c_driver().reexec(dir.path(), &args).unwrap();

        let recorded = fs::read_to_string(dir.path().join("args.txt")).unwrap();
        assert_eq!(recorded.trim(), "-Debug -j 4");
    }

    #[cfg(unix)]
    #[test]
    fn test_reexec_failure_is_reported() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("build");
        fs::write(&script, "#!/bin/sh\nexit 3\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let result = Bootstrap::c_driver().reexec(dir.path(), &["./build".to_string()]);
        assert!(matches!(result, Err(BuildError::ReexecFailed(3))));
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_rebuild_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let bootstrap = Bootstrap::c_driver().with_command(Command::new(["false"]));

        let result = bootstrap.rebuild(dir.path(), "cc", Mode::Release);
        assert!(matches!(result, Err(BuildError::RebuildFailed(1))));
    }

    #[cfg(unix)]
    fn stale_script_driver(dir: &Path, body: &str) -> Bootstrap {
        use std::os::unix::fs::PermissionsExt;

        let now = SystemTime::now();
        write_at(&dir.join("build"), "#!/bin/sh\nexit 9\n", now - Duration::from_secs(60));
        write_at(&dir.join("driver.sh"), body, now);
        for name in ["build", "driver.sh"] {
            fs::set_permissions(dir.join(name), fs::Permissions::from_mode(0o755)).unwrap();
        }
        Bootstrap::new(["driver.sh"], "build").with_command(Command::new(["cp", "driver.sh", "build"]))
    }

    #[cfg(unix)]
    #[test]
    fn test_stale_driver_is_rebuilt_and_rerun() {
        let dir = tempfile::tempdir().unwrap();
        let bootstrap = stale_script_driver(dir.path(), "#!/bin/sh\necho \"$@\" > args.txt\n");
        let args: Vec<String> = ["./build", "-Release", "-j", "2"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        assert!(bootstrap.refresh(dir.path(), "cc", Mode::Release, &args).unwrap());

        let recorded = fs::read_to_string(dir.path().join("args.txt")).unwrap();
        assert_eq!(recorded.trim(), "-Release -j 2");
        assert!(!bootstrap.needs_rebuild(dir.path()).unwrap());
        assert!(!bootstrap.refresh(dir.path(), "cc", Mode::Release, &args).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_rebuild_does_not_rerun() {
        let dir = tempfile::tempdir().unwrap();
        let bootstrap = stale_script_driver(dir.path(), "#!/bin/sh\ntouch ran\n")
            .with_command(Command::new(["exit", "4"]));

        let result = bootstrap.refresh(dir.path(), "cc", Mode::Release, &["./build".to_string()]);
        assert!(matches!(result, Err(BuildError::RebuildFailed(4))));
        assert!(!dir.path().join("ran").exists());
    }
}
