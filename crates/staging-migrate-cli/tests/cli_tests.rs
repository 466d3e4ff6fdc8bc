//! CLI integration tests for staging-migrate.
//!
//! These tests verify command-line argument parsing, help output,
//! the offline setup check, and exit codes for configuration errors.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::TempDir;

/// Get a command for the staging-migrate binary.
fn cmd() -> Command {
    Command::cargo_bin("staging-migrate").unwrap()
}

/// Write a configuration into `dir` and return its path.
fn write_config(dir: &TempDir, dump_file: &str, username: &str) -> String {
    let path = dir.path().join("migration_config.yaml");
    let yaml = format!(
        r#"
connections:
  staging:
    host: localhost
    database: staging
    username: {username}
    password: password
    dump_file: {dump_file}
  microservices:
    product_service:
      host: localhost
      database: products
      username: root
migrations:
  - migration_id: products
    source:
      tables: [{{ name: products }}]
    transformation:
      type: custom
      handler: passthrough
    targets:
      - {{ database: product_service, table: products }}
environment:
  defaults:
    STAGING_MIGRATE_TEST_USER: root
"#
    );
    std::fs::write(&path, yaml).unwrap();
    path.to_str().unwrap().to_string()
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
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("staging-migrate"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_config_default_path() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("[default: migration_config.yaml]"));
}

#[test]
fn test_logging_flags() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"))
        .stdout(predicate::str::contains("--log-file"))
        .stdout(predicate::str::contains("--output-json"));
}

#[test]
fn test_short_config_flag() {
    cmd()
        .args(["-c", "some_config.yaml", "--help"])
        .assert()
        .success();
}

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

// =============================================================================
// Exit Code Tests - Config Errors (Exit Code 1)
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_1() {
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "run"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("IO error"));
}

#[test]
fn test_invalid_yaml_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "run"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_empty_config_exits_with_code_1() {
    let file = tempfile::NamedTempFile::new().unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "check"])
        .assert()
        .code(1);
}

#[test]
fn test_missing_migrations_section_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "connections:").unwrap();
    writeln!(file, "  staging:").unwrap();
    writeln!(file, "    host: localhost").unwrap();
    writeln!(file, "    database: staging").unwrap();
    writeln!(file, "    username: root").unwrap();
    writeln!(file, "    dump_file: dump.sql").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("migrations"));
}

// =============================================================================
// Setup Check Tests
// =============================================================================

#[test]
fn test_check_warns_on_missing_dump() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "absent.sql", "root");

    cmd()
        .args(["--config", &config, "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration: OK"))
        .stdout(predicate::str::contains("Warning: dump file not found"))
        .stdout(predicate::str::contains("- products"));
}

#[test]
fn test_check_finds_dump_and_lists_defaults() {
    let dir = TempDir::new().unwrap();
    let dump = dir.path().join("dump.sql");
    std::fs::write(&dump, "-- dump\n").unwrap();
    let config = write_config(
        &dir,
        dump.to_str().unwrap(),
        "${STAGING_MIGRATE_TEST_USER}",
    );

    cmd()
        .env_remove("STAGING_MIGRATE_TEST_USER")
        .args(["--config", &config, "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(found)"))
        .stdout(predicate::str::contains("STAGING_MIGRATE_TEST_USER"));
}

#[test]
fn test_check_json_output() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "absent.sql", "root");

    let output = cmd()
        .args(["--config", &config, "--output-json", "check"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["dump_file_present"], false);
    assert_eq!(report["services"][0], "staging");
    assert_eq!(report["services"][1], "product_service");
}

#[test]
fn test_check_unregistered_handler_exits_with_code_1() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "absent.sql", "root");
    let yaml = std::fs::read_to_string(&config)
        .unwrap()
        .replace("handler: passthrough", "handler: product_catalog");
    std::fs::write(&config, yaml).unwrap();

    cmd()
        .args(["--config", &config, "check"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "- products [custom: product_catalog] (UNRESOLVED)",
        ));
}

#[test]
fn test_check_json_reports_transformation_resolution() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "absent.sql", "root");

    let output = cmd()
        .args(["--config", &config, "--output-json", "check"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["migrations"][0]["migration_id"], "products");
    assert_eq!(report["migrations"][0]["kind"], "custom");
    assert_eq!(report["migrations"][0]["handler"], "passthrough");
    assert_eq!(report["migrations"][0]["resolved"], true);
}

#[test]
fn test_check_unresolved_placeholder_exits_with_code_1() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "absent.sql", "${STAGING_MIGRATE_UNSET_USER}");

    cmd()
        .env_remove("STAGING_MIGRATE_UNSET_USER")
        .args(["--config", &config, "check"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("STAGING_MIGRATE_UNSET_USER"));
}

#[test]
fn test_log_file_receives_plain_text() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "absent.sql", "root");
    let log = dir.path().join("migration.log");

    cmd()
        .args([
            "--config",
            &config,
            "--log-file",
            log.to_str().unwrap(),
            "check",
        ])
        .assert()
        .success();

    let contents = std::fs::read_to_string(&log).unwrap();
    assert!(contents.contains("Loaded configuration"));
    assert!(!contents.contains('\u{1b}'));
}
