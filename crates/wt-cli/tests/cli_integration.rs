//! Integration tests for the webssh-tunnel binary

use assert_cmd::Command;
use predicates::prelude::*;

fn webssh_tunnel() -> Command {
    let mut cmd = Command::cargo_bin("webssh-tunnel").expect("Failed to find webssh-tunnel binary");
    for var in ["NAME", "REMOTE", "LOCAL_PORT", "TIMEOUT", "MAX_RUNTIME", "TERMINAL"] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help() {
    webssh_tunnel()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--name"))
        .stdout(predicate::str::contains("--remote"))
        .stdout(predicate::str::contains("--save-pass"))
        .stdout(predicate::str::contains("--max-runtime"));
}

#[test]
fn test_version_subcommand() {
    webssh_tunnel()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("webssh-tunnel version: "));
}

#[test]
fn test_version_flag() {
    webssh_tunnel()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("webssh-tunnel"));
}

#[test]
fn test_missing_name_fails() {
    webssh_tunnel()
        .args(["--remote", "127.0.0.1:9"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Missing required field: name"));
}

#[test]
fn test_name_from_environment_is_used() {
    webssh_tunnel()
        .env("NAME", "bad name!")
        .args(["--remote", "127.0.0.1:9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid name"));
}

#[test]
fn test_unknown_flag_is_usage_error() {
    webssh_tunnel()
        .arg("--no-such-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unexpected argument"));
}
