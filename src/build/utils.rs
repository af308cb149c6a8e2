use super::core::Build;
use super::include::IncludeSpec;
use super::link::LinkSpec;
use super::unit::UnitRef;
use crate::config::{BuildConfig, Manifest, Mode, StepConfig};
use crate::error::{BuildError, BuildResult};
use crate::process::Command;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

// --- Helper: Load Manifest ---
pub fn load_manifest(path: &Path) -> BuildResult<Manifest> {
    if !path.exists() {
        return Err(BuildError::manifest(
            path,
            "file not found. Create one with at least one [[step]] table",
        ));
    }
    let content = fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
    toml::from_str(&content).map_err(|e| BuildError::manifest(path, e))
}

/// Build a [`Build`] rooted at `root` from a parsed manifest.
///
/// `args` are the driver arguments, `argv[0]` included. Manifest builds never
/// self-rebuild.
pub fn configure_from_manifest(
    manifest: &Manifest,
    manifest_path: &Path,
    root: &Path,
    args: Vec<String>,
) -> BuildResult<Build> {
    let mut config = BuildConfig::new(&manifest.build_dir)
        .with_root(root)
        .with_args(args);
    if let Some(compiler) = &manifest.compiler {
        config = config.with_compiler(compiler.clone());
    }

    let mut build = Build::from_config(config)?;
    if !manifest.compile_commands {
        build.skip_compile_commands();
    }

    // Canonical source path -> unit, for link_sources in later steps.
    let mut compiled: HashMap<PathBuf, UnitRef> = HashMap::new();

    for (i, step) in manifest.steps.iter().enumerate() {
        if i > 0 {
            build.step();
        }
        configure_step(&mut build, step, manifest_path, &mut compiled)?;
    }

    Ok(build)
}

fn configure_step(
    build: &mut Build,
    step: &StepConfig,
    manifest_path: &Path,
    compiled: &mut HashMap<PathBuf, UnitRef>,
) -> BuildResult<()> {
    if let Some(name) = &step.name {
        build.set_step_name(name.clone());
    }
    if let Some(compiler) = &step.compiler {
        build.set_compiler(compiler.clone());
    }
    if let Some(output) = &step.output {
        build.set_output_file(output.clone());
    }
    if step.skip_linking {
        build.skip_linking();
    }

    for line in &step.pre {
        build.add_pre_step_command(Command::new([line.clone()]));
    }

    // Resolve against earlier steps only.
    let mut linked = Vec::with_capacity(step.link_sources.len());
    for source in &step.link_sources {
        let unit = compiled
            .get(&build.canonicalise(source))
            .copied()
            .ok_or_else(|| {
                BuildError::manifest(
                    manifest_path,
                    format!("link_sources entry {} is not compiled by an earlier step", source),
                )
            })?;
        linked.push(unit);
    }

    let mut added: Vec<UnitRef> = step.sources.iter().map(|s| build.add_source(s)).collect();
    for dir in &step.source_dirs {
        added.extend(build.add_sources_from(dir));
    }
    for unit in added {
        if let Some(source) = build.unit(unit).map(|u| u.source().to_path_buf()) {
            compiled.insert(source, unit);
        }
    }

    for unit in linked {
        build.link_unit(unit);
    }

    for dir in &step.includes {
        build.add_include(IncludeSpec::direct(dir));
    }
    for (name, dir) in &step.symbolic_includes {
        build.add_include(IncludeSpec::symbolic(dir, name.clone()));
    }

    let mode_flags = match build.mode() {
        Mode::Debug => &step.debug_flags,
        Mode::Release => &step.release_flags,
    };
    for flag in step.flags.iter().chain(mode_flags) {
        build.add_compilation_flag(flag.clone());
    }
    for flag in &step.link_flags {
        build.add_linking_flag(flag.clone());
    }

    for lib in &step.libs {
        build.add_link(LinkSpec::direct(lib.clone()));
    }
    for lib_path in &step.lib_paths {
        build.add_link(LinkSpec::path(&lib_path.dir, lib_path.lib.clone()));
    }
    for file in &step.link_files {
        build.add_link(LinkSpec::file(file));
    }
    for framework in &step.frameworks {
        build.add_link(LinkSpec::framework(framework.clone()));
    }

    Ok(())
}
