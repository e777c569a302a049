use assert_cmd::prelude::*;
use predicates::str::contains;
use std::process::Command;

#[test]
fn cli_without_arguments_prints_usage() {
    let mut cmd = Command::cargo_bin("awe-viewer").expect("binary exists");
    cmd.assert()
        .failure()
        .stderr(contains("Usage: awe-viewer <resource-dir> <shader-dir>"));
}

#[test]
fn cli_rejects_missing_shader_directory() {
    let resources = tempfile::tempdir().expect("temp dir");
    let missing = resources.path().join("shaders");
    let mut cmd = Command::cargo_bin("awe-viewer").expect("binary exists");
    cmd.arg(resources.path()).arg(&missing);
    cmd.assert()
        .failure()
        .stderr(contains("shader directory"))
        .stderr(contains("does not exist"));
}

#[test]
fn cli_rejects_unknown_flags() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut cmd = Command::cargo_bin("awe-viewer").expect("binary exists");
    cmd.arg(dir.path()).arg(dir.path()).arg("--fullscreen");
    cmd.assert()
        .failure()
        .stderr(contains("Unknown argument: --fullscreen"));
}
