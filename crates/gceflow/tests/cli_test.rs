#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;

fn gceflow() -> Command {
    Command::cargo_bin("gceflow").unwrap()
}

#[test]
fn test_cli_help() {
    gceflow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Compute Engine"))
        .stdout(predicate::str::contains("create"))
        .stdout(predicate::str::contains("destroy-group"))
        .stdout(predicate::str::contains("reclaim"))
        .stdout(predicate::str::contains("list"));
}

#[test]
fn test_cli_version() {
    gceflow()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("gceflow"));
}

#[test]
fn test_create_help() {
    gceflow()
        .args(["create", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<GROUP>"))
        .stdout(predicate::str::contains("--count"))
        .stdout(predicate::str::contains("--port"))
        .stdout(predicate::str::contains("--machine-type"));
}

#[test]
fn test_reclaim_help() {
    gceflow()
        .args(["reclaim", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<NETWORK>"));
}

#[test]
fn test_reclaim_requires_network() {
    gceflow().arg("reclaim").assert().failure();
}

#[test]
fn test_config_path_pointing_nowhere() {
    let dir = tempfile::TempDir::new().unwrap();
    let missing = dir.path().join("missing.yaml");
    gceflow()
        .current_dir(dir.path())
        .env("GCEFLOW_CONFIG_PATH", &missing)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.yaml"));
}

#[test]
fn test_destroy_rejects_malformed_node_id() {
    let dir = tempfile::TempDir::new().unwrap();
    gceflow()
        .current_dir(dir.path())
        .args(["destroy", "no-zone-here"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no-zone-here"));
}

#[test]
fn test_missing_settings_file() {
    let dir = tempfile::TempDir::new().unwrap();
    gceflow()
        .current_dir(dir.path())
        .env_remove("GCEFLOW_CONFIG_PATH")
        .env("XDG_CONFIG_HOME", dir.path())
        .env("HOME", dir.path())
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("設定ファイルが見つかりません"))
        .stderr(predicate::str::contains("gceflow.local.yaml"));
}

#[test]
fn test_missing_access_token() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("gceflow.yaml"), "project: myproject\n").unwrap();
    gceflow()
        .current_dir(dir.path())
        .env_remove("GCEFLOW_CONFIG_PATH")
        .env_remove("GCEFLOW_ACCESS_TOKEN")
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("GCEFLOW_ACCESS_TOKEN"));
}
