//! # cbuild - Build Driver Library for C Projects
//!
//! A build is described in code (or in a `cbuild.toml` manifest) as an ordered
//! list of steps. Each step compiles its sources in parallel, skips objects
//! that are newer than everything they include, and links the result.
//!
//! ## Features
//!
//! - **Incremental**: dependencies come from the compiler's own `-MM` output
//! - **Parallel**: one queue per worker, filled round-robin
//! - **Multi-step**: later steps can link objects produced by earlier ones
//! - **IDE Friendly**: writes `compile_commands.json` for clangd
//! - **Self-rebuilding**: a driver built from `build.c` recompiles itself
//!
//! ## Quick Start
//!
//! ```no_run
//! use cbuild::build::{Build, IncludeSpec, LinkSpec};
//!
//! let args: Vec<String> = std::env::args().collect();
//! let mut build = Build::new(".build", args)?;
//! build.add_source("src/main.c");
//! build.add_include(IncludeSpec::direct("include"));
//! build.add_link(LinkSpec::direct("m"));
//! build.build()?;
//! # Ok::<(), cbuild::error::BuildError>(())
//! ```
//!
//! ## Module Organization
//!
//! - [`build`] - Build model, compile workers and step execution
//! - [`config`] - Build settings and the `cbuild.toml` manifest
//! - [`process`] - Command model and child process execution
//! - [`paths`] - Path canonicalisation and object-path mirroring

/// Build model, compile workers and step execution.
pub mod build;

/// Build settings and manifest parsing (`cbuild.toml`).
pub mod config;

/// Error types shared by the whole library.
pub mod error;

/// Compile database (`compile_commands.json`).
pub mod ide;

/// Leveled stderr logging and fatal exits.
pub mod logger;

/// Path canonicalisation and object-path mirroring.
pub mod paths;

/// Command model and child process execution.
pub mod process;
