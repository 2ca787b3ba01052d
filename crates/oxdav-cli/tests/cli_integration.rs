#![allow(deprecated)] // cargo_bin! macro doesn't exist yet in assert_cmd 2.1

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const TEST_API_KEY: &str = "drime-key-1234";

/// `oxdav` with an isolated store directory and no ambient credentials
fn oxdav(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("oxdav").unwrap();
    cmd.env("OXDAV_CONFIG_DIR", config_dir.path())
        .env_remove("DRIME_API_KEY")
        .env_remove("OXDAV_PASSWORD")
        .env_remove("OXDAV_BACKEND")
        .env_remove("RUST_LOG");
    cmd
}

fn add_local(config_dir: &TempDir, name: &str, path: &std::path::Path) {
    oxdav(config_dir)
        .args(["config", "add", name, "--type", "local", "--path"])
        .arg(path)
        .assert()
        .success();
}

fn add_drime(config_dir: &TempDir, name: &str) {
    oxdav(config_dir)
        .args(["config", "add", name, "--type", "drime", "--workspace-id", "42"])
        .env("DRIME_API_KEY", TEST_API_KEY)
        .assert()
        .success();
}

// ============================================================================
// Basic CLI tests
// ============================================================================

#[test]
fn test_help() {
    let dir = TempDir::new().unwrap();
    oxdav(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("WebDAV server"))
        .stdout(predicate::str::contains("--backend"))
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("providers"));
}

#[test]
fn test_version() {
    let dir = TempDir::new().unwrap();
    oxdav(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("oxdav"));
}

#[test]
fn test_config_add_help_mentions_obscuring() {
    let dir = TempDir::new().unwrap();
    oxdav(&dir)
        .args(["config", "add", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not encrypted"));
}

// ============================================================================
// Resolution failures (exit before any socket is bound)
// ============================================================================

#[test]
fn test_unknown_backend_lists_choices() {
    let dir = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    add_local(&dir, "photos", root.path());

    oxdav(&dir)
        .args(["--backend", "s3"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown backend 's3'"))
        .stderr(predicate::str::contains("local, drime"))
        .stderr(predicate::str::contains("Configured backends: photos"));
}

#[test]
fn test_legacy_drime_without_env_key_reports_unavailable_type() {
    let dir = TempDir::new().unwrap();
    oxdav(&dir)
        .args(["--backend", "drime"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("requires extra installation"))
        .stderr(predicate::str::contains("DRIME_API_KEY").not());
}

#[test]
fn test_legacy_drime_is_unavailable_in_this_build() {
    let dir = TempDir::new().unwrap();
    oxdav(&dir)
        .args(["--backend", "DRIME"])
        .env("DRIME_API_KEY", TEST_API_KEY)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("requires extra installation"));
}

#[test]
fn test_named_drime_is_unavailable_in_this_build() {
    let dir = TempDir::new().unwrap();
    add_drime(&dir, "cloud");

    oxdav(&dir)
        .args(["--backend", "cloud"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("requires extra installation"));
}

#[test]
fn test_partial_tls_pair_is_rejected() {
    let dir = TempDir::new().unwrap();
    oxdav(&dir)
        .args(["--ssl-cert", "/nonexistent/cert.pem"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--ssl-key"));
}

#[test]
fn test_named_local_backend_pointing_at_file_fails() {
    let dir = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let file = root.path().join("not-a-dir");
    fs::write(&file, b"x").unwrap();
    add_local(&dir, "broken", &file);

    oxdav(&dir)
        .args(["--backend", "broken"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to initialize Local backend"));
}

#[test]
fn test_malformed_store_is_reported() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("backends.toml"), "this is = = not toml").unwrap();

    oxdav(&dir)
        .args(["config", "list"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("backends.toml"));
}

// ============================================================================
// Config command
// ============================================================================

#[test]
fn test_config_path() {
    let dir = TempDir::new().unwrap();
    oxdav(&dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            dir.path().join("backends.toml").to_string_lossy().into_owned(),
        ));
}

#[test]
fn test_config_list_empty() {
    let dir = TempDir::new().unwrap();
    oxdav(&dir)
        .args(["config", "list"])
        .assert()
        .success()
        .stderr(predicate::str::contains("No backends configured"));
}

#[test]
fn test_config_add_requires_type() {
    let dir = TempDir::new().unwrap();
    oxdav(&dir)
        .args(["config", "add", "photos", "--path", "/srv"])
        .assert()
        .code(2);
}

#[test]
fn test_config_add_rejects_unknown_type() {
    let dir = TempDir::new().unwrap();
    oxdav(&dir)
        .args(["config", "add", "bucket", "--type", "s3"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown backend type 's3'"));
}

#[test]
fn test_config_add_local_requires_path() {
    let dir = TempDir::new().unwrap();
    oxdav(&dir)
        .args(["config", "add", "photos", "--type", "local"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--path is required"));
}

#[test]
fn test_config_add_and_list_local() {
    let dir = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();

    oxdav(&dir)
        .args(["config", "add", "photos", "--type", "local", "--readonly", "--path"])
        .arg(root.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Added backend 'photos' (type: local)"));

    oxdav(&dir)
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("photos"))
        .stdout(predicate::str::contains("Read-only"));
}

#[test]
fn test_config_add_twice_updates() {
    let dir = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    add_local(&dir, "photos", root.path());

    oxdav(&dir)
        .args(["config", "add", "photos", "--type", "local", "--path"])
        .arg(root.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Updated backend 'photos'"));
}

#[test]
fn test_config_list_json_filters_by_type() {
    let dir = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    add_local(&dir, "photos", root.path());
    add_drime(&dir, "cloud");

    let output = oxdav(&dir)
        .args(["config", "list", "--json", "--type", "drime"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let backends = json.as_array().unwrap();
    assert_eq!(backends.len(), 1);
    assert_eq!(backends[0]["name"], "cloud");
    assert_eq!(backends[0]["type"], "drime");
    assert_eq!(backends[0]["fields"]["api_key"], "********");
    assert_eq!(backends[0]["fields"]["workspace_id"], 42);
}

#[test]
fn test_drime_api_key_is_obscured_on_disk() {
    let dir = TempDir::new().unwrap();
    add_drime(&dir, "cloud");

    let contents = fs::read_to_string(dir.path().join("backends.toml")).unwrap();
    assert!(contents.contains("[cloud]"));
    assert!(!contents.contains(TEST_API_KEY));
}

#[test]
fn test_config_show_masks_unless_revealed() {
    let dir = TempDir::new().unwrap();
    add_drime(&dir, "cloud");

    oxdav(&dir)
        .args(["config", "show", "cloud"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Type: drime"))
        .stdout(predicate::str::contains("api_key: ********"))
        .stdout(predicate::str::contains(TEST_API_KEY).not());

    oxdav(&dir)
        .args(["config", "show", "cloud", "--reveal"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("api_key: {TEST_API_KEY}")));
}

#[test]
fn test_config_add_reads_api_key_from_stdin() {
    let dir = TempDir::new().unwrap();
    oxdav(&dir)
        .args(["config", "add", "cloud", "--type", "drime", "--api-key-stdin"])
        .write_stdin("piped-key\n")
        .assert()
        .success();

    oxdav(&dir)
        .args(["config", "show", "cloud", "--reveal"])
        .assert()
        .success()
        .stdout(predicate::str::contains("api_key: piped-key"));
}

#[test]
fn test_config_add_stores_max_file_size_in_bytes() {
    let dir = TempDir::new().unwrap();
    oxdav(&dir)
        .args(["config", "add", "cloud", "--type", "drime", "--max-file-size", "524288000"])
        .env("DRIME_API_KEY", TEST_API_KEY)
        .assert()
        .success();

    oxdav(&dir)
        .args(["config", "show", "cloud"])
        .assert()
        .success()
        .stdout(predicate::str::contains("max_file_size: 524288000 (500.0M)"));
}

#[test]
fn test_config_add_drime_without_key_fails_without_tty() {
    let dir = TempDir::new().unwrap();
    oxdav(&dir)
        .args(["config", "add", "cloud", "--type", "drime"])
        .write_stdin("")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not a terminal"));
}

#[test]
fn test_config_add_rejects_flags_for_other_type() {
    let dir = TempDir::new().unwrap();
    oxdav(&dir)
        .args([
            "config", "add", "photos", "--type", "local", "--path", "/srv", "--workspace-id", "3",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--workspace-id cannot be used with local backends"));
}

#[test]
fn test_config_show_missing() {
    let dir = TempDir::new().unwrap();
    oxdav(&dir)
        .args(["config", "show", "ghost"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Backend 'ghost' not found"));
}

#[test]
fn test_config_remove() {
    let dir = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    add_local(&dir, "photos", root.path());

    oxdav(&dir)
        .args(["config", "remove", "photos"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed backend 'photos'"));

    oxdav(&dir)
        .args(["config", "remove", "photos"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}

// ============================================================================
// Providers command
// ============================================================================

#[test]
fn test_providers_json() {
    let dir = TempDir::new().unwrap();
    let output = oxdav(&dir).args(["providers", "--json"]).output().unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let providers = json.as_array().unwrap();
    assert_eq!(providers.len(), 2);
    assert_eq!(providers[0]["id"], "local");
    assert_eq!(providers[0]["available"], true);
    assert_eq!(providers[1]["id"], "drime");
    assert_eq!(providers[1]["available"], false);
    assert!(
        providers[1]["unavailable_reason"]
            .as_str()
            .unwrap()
            .contains("requires extra installation")
    );
}

#[test]
fn test_providers_table() {
    let dir = TempDir::new().unwrap();
    oxdav(&dir)
        .arg("providers")
        .assert()
        .success()
        .stdout(predicate::str::contains("Available"))
        .stdout(predicate::str::contains("Unavailable"));
}
