//! Integration tests for `stratus config`.
//!
//! Every test points `STRATUS_CONFIG` at a temp path so they never read
//! `~/.stratus/config.yaml`.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn stratus() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("stratus"));
    cmd.env("NO_COLOR", "1");
    cmd
}

fn temp_config_path() -> (TempDir, String) {
    let dir = TempDir::new().expect("temp dir");
    let path = dir
        .path()
        .join("config.yaml")
        .to_string_lossy()
        .into_owned();
    (dir, path)
}

#[test]
fn test_config_path_prints_env_override() {
    let (_dir, path) = temp_config_path();
    stratus()
        .args(["config", "path"])
        .env("STRATUS_CONFIG", &path)
        .assert()
        .success()
        .stdout(predicate::str::contains(path.as_str()));
}

#[test]
fn test_config_path_flag_wins_over_env() {
    let (_dir, path) = temp_config_path();
    stratus()
        .args(["--config", &path, "config", "path"])
        .env("STRATUS_CONFIG", "/nonexistent/other.yaml")
        .assert()
        .success()
        .stdout(predicate::str::contains(path.as_str()));
}

#[test]
fn test_config_show_without_file_prints_defaults() {
    let (_dir, path) = temp_config_path();
    stratus()
        .args(["config", "show"])
        .env("STRATUS_CONFIG", &path)
        .assert()
        .success()
        .stdout(predicate::str::contains("rocket-lb"))
        .stdout(predicate::str::contains("nyc3"));
}

#[test]
fn test_config_show_reads_file_values() {
    let (_dir, path) = temp_config_path();
    std::fs::write(&path, "provider:\n  region: ams3\n").unwrap();
    stratus()
        .args(["config", "show"])
        .env("STRATUS_CONFIG", &path)
        .assert()
        .success()
        .stdout(predicate::str::contains("ams3"));
}

#[test]
fn test_config_show_rejects_malformed_yaml() {
    let (_dir, path) = temp_config_path();
    std::fs::write(&path, "provider: [unclosed\n").unwrap();
    stratus()
        .args(["config", "show"])
        .env("STRATUS_CONFIG", &path)
        .assert()
        .failure();
}
