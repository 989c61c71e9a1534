//! Basic CLI E2E tests.
//!
//! Each test runs the binary against its own data directory and sticks to
//! commands that never reach the network.

use std::path::Path;
use std::process::Command;

/// Run a CLI command against `data_dir` and return (stdout, stderr, code).
fn run_cli(data_dir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_buytime"))
        .args(args)
        .env("BUYTIME_DATA_DIR", data_dir)
        .env("BUYTIME_TOKEN", "test-token")
        .env_remove("BUYTIME_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_ok(data_dir: &Path, args: &[&str]) -> String {
    let (stdout, stderr, code) = run_cli(data_dir, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    stdout
}

#[test]
fn test_balance_show_fresh_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let stdout = run_ok(dir.path(), &["balance", "show", "--json"]);
    let snapshot: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(snapshot["available_minutes"], 0);
    assert_eq!(snapshot["spend_unit_minutes"], 5);
    assert_eq!(snapshot["last_confirmed_remote_value"]["state"], "unsynced");
}

#[test]
fn test_balance_reset() {
    let dir = tempfile::tempdir().unwrap();
    let stdout = run_ok(dir.path(), &["balance", "reset", "40"]);
    assert!(stdout.contains("40"));
    let stdout = run_ok(dir.path(), &["balance", "show"]);
    assert!(stdout.contains("Available:  40 min"));
    assert!(stdout.contains("never synced"));
}

#[test]
fn test_shield_spend_and_relock() {
    let dir = tempfile::tempdir().unwrap();
    run_ok(dir.path(), &["balance", "reset", "12"]);

    let stdout = run_ok(
        dir.path(),
        &["shield", "setup", "--app", "app.social", "--domain", "video.example"],
    );
    assert!(stdout.contains("2 target(s)"));
    assert!(stdout.contains("restricted"));

    let stdout = run_ok(dir.path(), &["shield", "spend", "--minutes", "15"]);
    assert!(stdout.contains("7 min left"));

    let status = run_ok(dir.path(), &["shield", "status", "--json"]);
    let state: serde_json::Value = serde_json::from_str(&status).unwrap();
    assert_eq!(state["state"], "monitoring");

    let (_, stderr, code) = run_cli(dir.path(), &["shield", "spend"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("already lifted"));

    let stdout = run_ok(dir.path(), &["shield", "threshold", "com.buytime.earnedTime"]);
    assert!(stdout.contains("re-applied"));
    let stdout = run_ok(dir.path(), &["shield", "threshold", "com.buytime.earnedTime"]);
    assert!(stdout.contains("ignored"));
}

#[test]
fn test_shield_spend_insufficient_balance() {
    let dir = tempfile::tempdir().unwrap();
    run_ok(dir.path(), &["balance", "reset", "3"]);
    run_ok(dir.path(), &["shield", "setup", "--category", "games"]);

    let (_, stderr, code) = run_cli(dir.path(), &["shield", "spend"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Insufficient balance"));
}

#[test]
fn test_shield_spend_unit() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(run_ok(dir.path(), &["shield", "spend-unit"]).trim(), "5");
    assert_eq!(run_ok(dir.path(), &["shield", "spend-unit", "10"]).trim(), "10");
    assert_eq!(run_ok(dir.path(), &["shield", "spend-unit"]).trim(), "10");
}

#[test]
fn test_prefs_show_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let stdout = run_ok(dir.path(), &["prefs", "show", "--json"]);
    let prefs: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(prefs["focus_duration_minutes"], 30);
    assert_eq!(prefs["focus_mode"], "easy");
}

#[test]
fn test_prefs_derive_switches_mode() {
    let dir = tempfile::tempdir().unwrap();
    let stdout = run_ok(dir.path(), &["prefs", "derive", "10", "--mode", "fun"]);
    assert!(stdout.contains("20 min focus"));
    assert!(stdout.contains("Medium"));
}

#[test]
fn test_config_get_set() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(run_ok(dir.path(), &["config", "get", "sync.debounce_ms"]).trim(), "500");
    run_ok(dir.path(), &["config", "set", "restriction.reapply_policy", "fail_open"]);
    assert_eq!(
        run_ok(dir.path(), &["config", "get", "restriction.reapply_policy"]).trim(),
        "fail_open"
    );

    let (_, stderr, code) = run_cli(dir.path(), &["config", "get", "no.such.key"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("unknown key"));
}
