//! # cbuild CLI Entry Point
//!
//! Builds a project described by a `cbuild.toml` manifest.
//!
//! ## Commands
//!
//! - `cbuild build [-Debug|-Release] [-j N]` - run every step of the manifest
//! - `cbuild clean` - remove the build directory and the compile database
//!
//! Running `cbuild` without a subcommand is the same as `cbuild build`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use cbuild::build;
use cbuild::config::MANIFEST_FILE;
use cbuild::logger;

#[derive(Parser)]
#[command(name = "cbuild")]
#[command(about = "Incremental, parallel build driver for C projects", version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the build manifest
    #[arg(long, global = true, default_value = MANIFEST_FILE)]
    manifest: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and link every step of the manifest
    Build {
        /// Driver options: -Debug, -Release, -j N (anything else is ignored)
        #[arg(num_args = 0.., allow_hyphen_values = true, trailing_var_arg = true)]
        args: Vec<String>,
    },
    /// Remove the build directory and compile_commands.json
    Clean,
}

fn main() {
    logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        logger::fatal(format!("{:#}", e));
    }
}

fn run(cli: Cli) -> Result<()> {
    let root = project_root(&cli.manifest)?;

    match cli.command.unwrap_or(Commands::Build { args: Vec::new() }) {
        Commands::Build { args } => {
            let manifest = build::load_manifest(&cli.manifest)?;

            let mut argv = vec!["cbuild".to_string()];
            argv.extend(args);
            let mut build = build::configure_from_manifest(&manifest, &cli.manifest, &root, argv)?;

            let start = Instant::now();
            let report = build.build()?;

            for step in &report.steps {
                if let Some(output) = &step.output {
                    println!("{} Linked {}", "✓".green(), output.display());
                }
            }
            println!(
                "{} Finished in {:.2?} ({} compiled, {} up to date)",
                "✓".green(),
                start.elapsed(),
                report.compiled(),
                report.up_to_date()
            );
        }
        Commands::Clean => {
            // Without a manifest the default directory is cleaned; a broken
            // one is an error.
            let build_dir = if cli.manifest.exists() {
                PathBuf::from(build::load_manifest(&cli.manifest)?.build_dir)
            } else {
                PathBuf::from(cbuild::config::DEFAULT_BUILD_DIR)
            };
            if build::clean(&root, &build_dir)? {
                println!("{} Clean complete.", "✓".green());
            } else {
                println!("{} Nothing to clean", "!".yellow());
            }
        }
    }

    Ok(())
}

/// Relative manifest paths resolve against the manifest's directory.
fn project_root(manifest: &Path) -> Result<PathBuf> {
    match manifest.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => Ok(dir.to_path_buf()),
        _ => std::env::current_dir().context("Failed to determine the current directory"),
    }
}
