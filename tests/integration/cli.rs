use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

/// The binary with an isolated, empty configuration location.
#[allow(deprecated)]
fn asana(config_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("asana").unwrap();
    cmd.env("ASANA_CONFIG_PATH", config_dir.join("config.toml"))
        .env("ASANA_NO_PROGRESS", "1")
        .env_remove("ASANA_ACCESS_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_version_flag() {
    let temp = TempDir::new().unwrap();
    asana(temp.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_lists_command_groups() {
    let temp = TempDir::new().unwrap();
    asana(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("task"))
        .stdout(predicate::str::contains("project"))
        .stdout(predicate::str::contains("section"))
        .stdout(predicate::str::contains("self-update"));
}

#[test]
fn test_invalid_gid_fails_before_authentication() {
    let temp = TempDir::new().unwrap();
    asana(temp.path())
        .args(["project", "get", "abc"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid project GID"));
}

#[test]
fn test_invalid_due_date_is_rejected() {
    let temp = TempDir::new().unwrap();
    asana(temp.path())
        .args(["task", "create", "-n", "Ship it", "--due", "2025-13-01"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid due date"));
}

#[test]
fn test_update_without_fields_lists_options() {
    let temp = TempDir::new().unwrap();
    asana(temp.path())
        .args(["task", "update", "123"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("At least one field must be specified for update"))
        .stderr(predicate::str::contains("--due-on"));
}

#[test]
fn test_commands_require_credentials() {
    let temp = TempDir::new().unwrap();
    asana(temp.path())
        .args(["auth", "whoami"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Asana access token not found"))
        .stderr(predicate::str::contains("asana auth login"));
}

#[test]
fn test_logout_removes_config_file() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("config.toml");
    std::fs::write(&config, "access_token = \"1/abc\"\nauth_type = \"pat\"\n").unwrap();

    asana(temp.path())
        .args(["auth", "logout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Successfully logged out"));

    assert!(!config.exists());
}

#[test]
fn test_config_flag_overrides_environment() {
    let temp = TempDir::new().unwrap();
    let elsewhere = temp.path().join("other.toml");
    std::fs::write(&elsewhere, "access_token = \"1/abc\"\n").unwrap();

    asana(temp.path())
        .args(["--config", elsewhere.to_str().unwrap(), "auth", "logout"])
        .assert()
        .success();

    assert!(!elsewhere.exists());
}

#[test]
fn test_unknown_format_is_a_usage_error() {
    let temp = TempDir::new().unwrap();
    asana(temp.path())
        .args(["--format", "yaml", "auth", "whoami"])
        .assert()
        .failure()
        .code(2);
}
