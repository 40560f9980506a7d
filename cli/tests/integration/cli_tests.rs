//! Integration tests for the CLI skeleton: help, version and argument parsing.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn stratus() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("stratus"));
    cmd.env("NO_COLOR", "1");
    cmd
}

// --- Help and version tests ---

#[test]
fn test_cli_no_args_shows_help_and_exits_two() {
    stratus().assert().code(2).stderr(predicate::str::contains(
        "Provision a droplet behind a TLS load balancer",
    ));
}

#[test]
fn test_cli_help_flag_lists_commands() {
    stratus()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("up"))
        .stdout(predicate::str::contains("plan"));
}

#[test]
fn test_cli_version_flag_shows_version() {
    stratus()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("stratus"));
}

#[test]
fn test_version_command_shows_package_version() {
    stratus()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "stratus {}",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_version_command_json_is_valid() {
    let output = stratus()
        .args(["version", "--json"])
        .output()
        .expect("run stratus");
    assert!(output.status.success());
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("version --json emits JSON");
    assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_unknown_subcommand_fails() {
    stratus()
        .arg("destroy")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

// --- up ---

#[test]
fn test_up_without_token_fails_before_provisioning() {
    let dir = tempfile::TempDir::new().expect("temp dir");
    let config = dir.path().join("config.yaml");
    std::fs::write(
        &config,
        "droplet:\n  ssh_key_name: laptop\ndns:\n  domain: example.com\n",
    )
    .expect("write config");

    stratus()
        .arg("up")
        .env("STRATUS_CONFIG", &config)
        .env_remove("DIGITALOCEAN_TOKEN")
        .assert()
        .failure()
        .stderr(predicate::str::contains("DIGITALOCEAN_TOKEN is not set"));
}

#[test]
fn test_up_with_incomplete_config_names_missing_setting() {
    let dir = tempfile::TempDir::new().expect("temp dir");
    let config = dir.path().join("config.yaml");

    stratus()
        .arg("up")
        .env("STRATUS_CONFIG", &config)
        .env("DIGITALOCEAN_TOKEN", "unused")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing setting: droplet.ssh_key_name"));
}
