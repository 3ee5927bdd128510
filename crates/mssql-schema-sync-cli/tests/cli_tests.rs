//! CLI integration tests for mssql-schema-sync.
//!
//! These tests verify command-line argument parsing, help output,
//! and exit codes for configuration errors.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the mssql-schema-sync binary.
fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("mssql-schema-sync").unwrap();
    for key in [
        "SQL_HOST",
        "SQL_PORT",
        "SQL_USER",
        "SQL_PASSWORD",
        "DATABASE_MODE",
        "DATABASES",
        "EXCLUDE_DATABASES",
        "GITLAB_URL",
        "GITLAB_TOKEN",
        "GITLAB_PROJECT",
        "GITLAB_BRANCH",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

fn config_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", content).unwrap();
    file
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("health-check"))
        .stdout(predicate::str::contains("list-databases"))
        .stdout(predicate::str::contains("init"));
}

#[test]
fn test_run_subcommand_help() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn test_init_subcommand_help() {
    cmd()
        .args(["init", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--output"))
        .stdout(predicate::str::contains("--advanced"))
        .stdout(predicate::str::contains("--force"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mssql-schema-sync"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_shutdown_timeout_default() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--shutdown-timeout"))
        .stdout(predicate::str::contains("[default: 60]"));
}

#[test]
fn test_output_json_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"));
}

#[test]
fn test_from_env_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--from-env"));
}

#[test]
fn test_log_flags_exist() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"))
        .stdout(predicate::str::contains("--log-file"));
}

// =============================================================================
// Exit Code Tests - Config Errors
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_7() {
    // Missing file is an IO error (code 7), not config error (code 1)
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "health-check"])
        .assert()
        .code(7);
}

#[test]
fn test_invalid_yaml_exits_with_code_1() {
    let file = config_file("invalid: yaml: content: [\n");

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "run"])
        .assert()
        .code(1);
}

#[test]
fn test_empty_config_exits_with_code_1() {
    let file = config_file("");

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "run"])
        .assert()
        .code(1);
}

#[test]
fn test_missing_token_exits_with_code_1() {
    let file = config_file(
        "server:\n  host: sql01\n  user: sync\nselection:\n  mode: all\nrepository:\n  url: https://gitlab.example.com\n  project: dba/schema\n",
    );

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "run", "--dry-run"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("repository.token is required"));
}

#[test]
fn test_token_from_environment_passes_validation_step() {
    // Validation passes, so the failure comes from the unreachable server instead
    let file = config_file(
        "server:\n  host: 127.0.0.1\n  port: 1\n  user: sync\n  connect_timeout_secs: 1\nselection:\n  mode: all\nrepository:\n  url: https://gitlab.example.com\n  project: dba/schema\n",
    );

    cmd()
        .env("GITLAB_TOKEN", "glpat-test")
        .args(["--config", file.path().to_str().unwrap(), "list-databases"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("repository.token is required").not());
}

#[test]
fn test_health_check_reports_unreachable_server() {
    let file = config_file(
        "server:\n  host: 127.0.0.1\n  port: 1\n  user: sync\n  connect_timeout_secs: 1\nselection:\n  mode: all\nrepository:\n  url: http://127.0.0.1:1\n  token: glpat-test\n  project: dba/schema\n  timeout_secs: 1\n",
    );

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("SQL Server: FAILED"))
        .stdout(predicate::str::contains("GitLab: FAILED"))
        .stdout(predicate::str::contains("Overall: UNHEALTHY"));
}

#[test]
fn test_from_env_without_variables_exits_with_code_1() {
    cmd()
        .args(["--from-env", "run"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("server.host is required"));
}

#[test]
fn test_invalid_database_mode_env_exits_with_code_1() {
    cmd()
        .env("DATABASE_MODE", "some")
        .args(["--from-env", "run"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("DATABASE_MODE"));
}

// =============================================================================
// Subcommand Existence Tests
// =============================================================================

#[test]
fn test_health_check_command_exists() {
    cmd()
        .args(["health-check", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Test SQL Server connection"));
}

#[test]
fn test_list_databases_command_exists() {
    cmd()
        .args(["list-databases", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("online user databases"));
}

// =============================================================================
// Config Path Tests
// =============================================================================

#[test]
fn test_config_default_path() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("[default: config.yaml]"));
}

#[test]
fn test_short_config_flag() {
    cmd()
        .args(["-c", "some_config.yaml", "--help"])
        .assert()
        .success();
}

// =============================================================================
// No Subcommand Tests
// =============================================================================

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}
