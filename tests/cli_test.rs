//! `cbuild` binary tests
//!
//! These tests drive the binary with a manifest and verify that failures
//! (missing manifest, failing pre-step commands) end the process with the
//! fatal exit status instead of being silently ignored.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const FATAL_EXIT_CODE: i32 = 404;

fn cbuild_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_cbuild"))
}

fn compiler_available() -> bool {
    Command::new("cc")
        .arg("--version")
        .output()
        .is_ok_and(|o| o.status.success())
}

fn run_cbuild(dir: &Path, args: &[&str]) -> Output {
    Command::new(cbuild_binary())
        .args(args)
        .current_dir(dir)
        .env("LOG_LEVEL", "ERROR")
        .output()
        .expect("Failed to execute cbuild")
}

fn create_project(manifest: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("cbuild.toml"), manifest).unwrap();
    fs::write(
        dir.path().join("src/main.c"),
        "#include <stdio.h>\nint main(void) { printf(\"hello\\n\"); return 0; }\n",
    )
    .unwrap();
    dir
}

#[test]
fn test_missing_manifest_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_cbuild(dir.path(), &["build"]);

    assert_eq!(output.status.code(), Some(FATAL_EXIT_CODE));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cbuild.toml"), "stderr: {}", stderr);
}

#[cfg(unix)]
#[test]
fn test_failing_pre_step_fails_the_build() {
    let project = create_project(
        r#"
[[step]]
pre = ["false"]
sources = ["src/main.c"]
"#,
    );
    let output = run_cbuild(project.path(), &["build"]);

    assert_eq!(
        output.status.code(),
        Some(FATAL_EXIT_CODE),
        "a failing pre-step must fail the build"
    );
    assert!(!project.path().join(".build/main").exists());
}

#[test]
fn test_manifest_build_and_clean() {
    if !compiler_available() {
        eprintln!("Skipping test: cc not found");
        return;
    }

    let project = create_project(
        r#"
build_dir = "out"
compiler = "cc"

[[step]]
pre = ["echo pre-step"]
sources = ["src/main.c"]
link_flags = ["-std=c2x"]
output = "hello"
"#,
    );

    let output = run_cbuild(project.path(), &["build", "-Debug", "-j", "2"]);
    assert!(
        output.status.success(),
        "build failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(project.path().join("out/hello").exists());
    assert!(project.path().join("out/src/main.o").exists());
    assert!(project.path().join("compile_commands.json").exists());

    let run = Command::new(project.path().join("out/hello")).output().unwrap();
    assert_eq!(String::from_utf8_lossy(&run.stdout).trim(), "hello");

    let output = run_cbuild(project.path(), &["clean"]);
    assert!(output.status.success());
    assert!(!project.path().join("out").exists());
    assert!(!project.path().join("compile_commands.json").exists());
}

#[test]
fn test_explicit_manifest_path() {
    if !compiler_available() {
        eprintln!("Skipping test: cc not found");
        return;
    }

    let project = create_project(
        r#"
compiler = "cc"
compile_commands = false

[[step]]
sources = ["src/main.c"]
link_flags = ["-std=c2x"]
"#,
    );
    let elsewhere = tempfile::tempdir().unwrap();
    let manifest = project.path().join("cbuild.toml");

    let output = run_cbuild(
        elsewhere.path(),
        &["--manifest", manifest.to_str().unwrap(), "build"],
    );
    assert!(
        output.status.success(),
        "build failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    // Paths resolve against the manifest's directory.
    assert!(project.path().join(".build/main").exists());
    assert!(!project.path().join("compile_commands.json").exists());
    assert!(!elsewhere.path().join(".build").exists());
}

#[test]
fn test_clean_with_broken_manifest_is_fatal() {
    let project = create_project("build_dir = \"out\"\n[[step]\nsources = [\n");
    fs::create_dir_all(project.path().join(".build")).unwrap();
    fs::create_dir_all(project.path().join("out")).unwrap();

    let output = run_cbuild(project.path(), &["clean"]);
    assert_eq!(output.status.code(), Some(FATAL_EXIT_CODE));
    assert!(project.path().join(".build").exists());
    assert!(project.path().join("out").exists());
}

#[test]
fn test_clean_without_manifest_uses_default_dir() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join(".build")).unwrap();

    let output = run_cbuild(dir.path(), &["clean"]);
    assert!(output.status.success());
    assert!(!dir.path().join(".build").exists());
}

#[test]
fn test_clean_refuses_project_root() {
    let project = create_project("build_dir = \".\"\n\n[[step]]\nsources = [\"src/main.c\"]\n");

    let output = run_cbuild(project.path(), &["clean"]);
    assert_eq!(output.status.code(), Some(FATAL_EXIT_CODE));
    assert!(project.path().join("src/main.c").exists());
}
