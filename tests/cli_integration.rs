//! CLI integration tests
//!
//! These tests verify the command-line interface behavior, including:
//! - Command parsing and validation
//! - Output formatting
//! - Error handling
//! - Exit codes
//!
//! Everything here runs without a Docker daemon: the covered paths fail or
//! finish before the engine is contacted.

mod support;

use drydock::pipeline::{RecordStore, RunReport, RunState};
use std::fs;
use std::process::Command;
use support::drydock_bin;
use tempfile::TempDir;

#[test]
fn test_cli_help() {
    let output = Command::new(drydock_bin())
        .arg("--help")
        .output()
        .expect("Failed to run drydock --help");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("run"));
    assert!(stdout.contains("build"));
    assert!(stdout.contains("deploy"));
    assert!(stdout.contains("cleanup"));
    assert!(stdout.contains("status"));
}

#[test]
fn test_cli_version() {
    let output = Command::new(drydock_bin())
        .arg("--version")
        .output()
        .expect("Failed to run drydock --version");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("drydock"));
}

#[test]
fn test_status_without_record() {
    let dir = TempDir::new().unwrap();

    let output = Command::new(drydock_bin())
        .arg("status")
        .current_dir(dir.path())
        .env("DRYDOCK_STATE_DIR", dir.path().join("state"))
        .output()
        .expect("Failed to run drydock status");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("no deployment recorded"));
}

#[test]
fn test_status_reads_persisted_record() {
    let dir = TempDir::new().unwrap();
    let state_dir = dir.path().join("state");

    let mut report = RunReport::new("svc", "svc:1.0");
    report.transition(RunState::Building);
    report.fail(drydock::Stage::Build, "compile error", None);
    report.finish();
    RecordStore::new(&state_dir).save(&report).unwrap();

    let output = Command::new(drydock_bin())
        .args(["status", "--format", "json"])
        .current_dir(dir.path())
        .env("DRYDOCK_STATE_DIR", &state_dir)
        .output()
        .expect("Failed to run drydock status");

    assert!(output.status.success());
    let loaded: RunReport = serde_json::from_slice(&output.stdout).expect("status emitted JSON");
    assert_eq!(loaded.run_id, report.run_id);
    assert_eq!(loaded.state, RunState::Failed);
}

#[test]
fn test_build_success_and_rerun_equivalence() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("drydock.toml");
    fs::write(
        &config,
        format!(
            r#"
workdir = "{}"
build_command = ["sh", "-c", "mkdir -p target && printf stable > target/app.jar"]
artifact_glob = "target/*.jar"
"#,
            dir.path().display()
        ),
    )
    .unwrap();

    let run = || {
        Command::new(drydock_bin())
            .args(["--config", config.to_str().unwrap(), "build", "--format", "json"])
            .output()
            .expect("Failed to run drydock build")
    };

    let first = run();
    assert!(
        first.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&first.stderr)
    );
    let first_artifact: drydock::Artifact = serde_json::from_slice(&first.stdout).unwrap();

    // Unchanged source builds to an equivalent artifact
    let second = run();
    assert!(second.status.success());
    let second_artifact: drydock::Artifact = serde_json::from_slice(&second.stdout).unwrap();
    assert_eq!(first_artifact.digest, second_artifact.digest);
}

#[test]
fn test_build_failure_exit_code() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("drydock.toml");
    fs::write(
        &config,
        format!(
            r#"
workdir = "{}"
build_command = ["sh", "-c", "echo 'compile error' >&2; exit 1"]
"#,
            dir.path().display()
        ),
    )
    .unwrap();

    let output = Command::new(drydock_bin())
        .args(["--config", config.to_str().unwrap(), "build"])
        .output()
        .expect("Failed to run drydock build");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("compile error"));
}

#[test]
fn test_image_with_no_matching_artifact_fails() {
    let dir = TempDir::new().unwrap();

    let output = Command::new(drydock_bin())
        .args(["image", "--artifact", "target/*.jar", "--tag", "svc:1.0"])
        .current_dir(dir.path())
        .env("DRYDOCK_WORKDIR", dir.path())
        .output()
        .expect("Failed to run drydock image");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("matched no files"));
}

#[test]
fn test_image_with_ambiguous_artifact_fails() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("target")).unwrap();
    fs::write(dir.path().join("target/a.jar"), b"a").unwrap();
    fs::write(dir.path().join("target/b.jar"), b"b").unwrap();

    let output = Command::new(drydock_bin())
        .args(["image", "--artifact", "target/*.jar", "--tag", "svc:1.0"])
        .current_dir(dir.path())
        .env("DRYDOCK_WORKDIR", dir.path())
        .output()
        .expect("Failed to run drydock image");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ambiguous"));
}

#[test]
fn test_invalid_image_reference_is_rejected() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("target")).unwrap();
    fs::write(dir.path().join("target/app.jar"), b"jar").unwrap();

    let output = Command::new(drydock_bin())
        .args(["image", "--artifact", "target/*.jar", "--tag", "Bad Tag"])
        .current_dir(dir.path())
        .env("DRYDOCK_WORKDIR", dir.path())
        .output()
        .expect("Failed to run drydock image");

    assert!(!output.status.success());
}

#[test]
fn test_unreadable_config_file_is_rejected() {
    let output = Command::new(drydock_bin())
        .args(["--config", "/nonexistent/drydock.toml", "status"])
        .output()
        .expect("Failed to run drydock status");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("config file"));
}

#[test]
fn test_invalid_config_value_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("drydock.toml");
    fs::write(&config, "host_port = 0\n").unwrap();

    let output = Command::new(drydock_bin())
        .args(["--config", config.to_str().unwrap(), "build"])
        .output()
        .expect("Failed to run drydock build");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("host port"));
}
