//! Integration tests for the `sunprobe` CLI binary.
//!
//! Argument parsing, help, completions and config handling run without a
//! portal; fetch, watch, history and login run against a wiremock portal.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `sunprobe` binary with env isolation.
///
/// Clears all `SUNPROBE_*` env vars and points the config file into
/// `dir`, so tests never touch the user's real configuration.
fn sunprobe_cmd(dir: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("sunprobe");
    cmd.env("HOME", "/tmp/sunprobe-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/sunprobe-cli-test-nonexistent")
        .env("SUNPROBE_CONFIG", dir.join("config.toml"))
        .env("NO_COLOR", "1")
        .env_remove("SUNPROBE_PROFILE")
        .env_remove("SUNPROBE_PORTAL")
        .env_remove("SUNPROBE_COOKIE_FILE")
        .env_remove("SUNPROBE_OUTPUT")
        .env_remove("SUNPROBE_INSECURE")
        .env_remove("SUNPROBE_TIMEOUT")
        .env_remove("SUNPROBE_USERNAME")
        .env_remove("SUNPROBE_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn cookie_file(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("cookie.txt");
    std::fs::write(&path, content).unwrap();
    path
}

/// Command aimed at a mock portal with a session cookie on disk.
fn portal_cmd(dir: &TempDir, server: &MockServer) -> assert_cmd::Command {
    let cookie = cookie_file(dir, "SESSION=abc123\n");
    let mut cmd = sunprobe_cmd(dir.path());
    cmd.arg("--portal")
        .arg(server.uri())
        .arg("--cookie-file")
        .arg(cookie);
    cmd
}

/// Run the binary off the runtime so the mock server keeps serving.
async fn run(mut cmd: assert_cmd::Command) -> std::process::Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

async fn mount_live(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/live"))
        .and(header("cookie", "SESSION=abc123"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "pvPower": 1520, "energyToday": 8.4 })),
        )
        .mount(server)
        .await;
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let dir = tempfile::tempdir().unwrap();
    let output = sunprobe_cmd(dir.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    let dir = tempfile::tempdir().unwrap();
    sunprobe_cmd(dir.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("solar")
            .and(predicate::str::contains("fetch"))
            .and(predicate::str::contains("watch"))
            .and(predicate::str::contains("history"))
            .and(predicate::str::contains("login")),
    );
}

#[test]
fn test_version_flag() {
    let dir = tempfile::tempdir().unwrap();
    sunprobe_cmd(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sunprobe"));
}

#[test]
fn test_invalid_subcommand() {
    let dir = tempfile::tempdir().unwrap();
    let output = sunprobe_cmd(dir.path()).arg("foobar").output().unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_invalid_output_format() {
    let dir = tempfile::tempdir().unwrap();
    let output = sunprobe_cmd(dir.path())
        .args(["--output", "invalid", "fetch"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(
        text.contains("invalid") || text.contains("possible values"),
        "Expected error about valid output formats:\n{text}"
    );
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    let dir = tempfile::tempdir().unwrap();
    sunprobe_cmd(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    let dir = tempfile::tempdir().unwrap();
    sunprobe_cmd(dir.path())
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honors_env() {
    let dir = tempfile::tempdir().unwrap();
    sunprobe_cmd(dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_show_no_config() {
    let dir = tempfile::tempdir().unwrap();
    sunprobe_cmd(dir.path()).args(["config", "show"]).assert().success();
}

#[test]
fn test_config_set_then_show() {
    let dir = tempfile::tempdir().unwrap();
    sunprobe_cmd(dir.path())
        .args(["config", "set", "portal", "https://portal.example.com"])
        .assert()
        .success();
    sunprobe_cmd(dir.path())
        .args(["config", "set", "endpoints", "/live,/api/v1/plants"])
        .assert()
        .success();

    let saved = std::fs::read_to_string(dir.path().join("config.toml")).unwrap();
    assert!(saved.contains("https://portal.example.com"), "{saved}");

    sunprobe_cmd(dir.path())
        .args(["--output", "json", "config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("https://portal.example.com")
                .and(predicate::str::contains("/api/v1/plants")),
        );
}

#[test]
fn test_config_set_rejects_bad_values() {
    let dir = tempfile::tempdir().unwrap();
    sunprobe_cmd(dir.path())
        .args(["config", "set", "max_retries", "lots"])
        .assert()
        .code(2);
    sunprobe_cmd(dir.path())
        .args(["config", "set", "retry_ceiling_ms", "1000"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("retry_ceiling_ms"));
    assert!(!dir.path().join("config.toml").exists());
}

#[test]
fn test_config_show_masks_password() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "default_profile = \"roof\"\n\n[profiles.roof]\nusername = \"alice\"\npassword = \"hunter2\"\n",
    )
    .unwrap();
    sunprobe_cmd(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("****").and(predicate::str::contains("hunter2").not()));
}

#[test]
fn test_unknown_profile_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    sunprobe_cmd(dir.path())
        .args(["--profile", "garage", "fetch"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("garage"));
}

// ── Fetch ───────────────────────────────────────────────────────────

#[test]
fn test_fetch_without_cookie_is_auth_error() {
    let dir = tempfile::tempdir().unwrap();
    sunprobe_cmd(dir.path())
        .args(["--portal", "http://127.0.0.1:9", "--cookie-file"])
        .arg(dir.path().join("missing.txt"))
        .arg("fetch")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("sunprobe login"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fetch_renders_plain_values() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    mount_live(&server).await;

    let mut cmd = portal_cmd(&dir, &server);
    cmd.args(["--output", "plain", "fetch", "-e", "/live"]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "currentPower=1520\ndailyEnergy=8.4"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fetch_json_carries_provenance() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    mount_live(&server).await;

    let mut cmd = portal_cmd(&dir, &server);
    cmd.args(["--output", "json", "fetch", "--endpoint", "/live"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let record: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(record["currentPower"], json!(1520.0));
    assert_eq!(record["dailyEnergy"], json!(8.4));
    assert_eq!(record["provenance"]["endpoint"], json!("/live"));
    assert_eq!(record["provenance"]["status"], json!("success"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fetch_table_formats_units() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    mount_live(&server).await;

    let mut cmd = portal_cmd(&dir, &server);
    cmd.args(["fetch", "-e", "/live"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1.52 kW"), "{stdout}");
    assert!(stdout.contains("8.40 kWh"), "{stdout}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fetch_rejected_session_exits_with_auth_code() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/live"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let mut cmd = portal_cmd(&dir, &server);
    cmd.args(["fetch", "-e", "/live"]);
    let output = run(cmd).await;
    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fetch_without_usable_data_exits_with_no_data_code() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/plants"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "plants": [{ "plantId": 7 }] })),
        )
        .mount(&server)
        .await;

    let mut cmd = portal_cmd(&dir, &server);
    cmd.args(["fetch", "-e", "/plants", "-e", "/gone"]);
    let output = run(cmd).await;
    assert_eq!(output.status.code(), Some(4), "{}", combined_output(&output));
    let text = combined_output(&output);
    assert!(text.contains("/gone"), "{text}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fetch_degraded_flag_accepts_partial_record() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/plants"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "plants": [{ "plantId": 7 }] })),
        )
        .mount(&server)
        .await;

    let mut cmd = portal_cmd(&dir, &server);
    cmd.args(["--output", "json", "fetch", "-e", "/plants", "--degraded"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let record: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(record["provenance"]["status"], json!("degraded"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fetch_unreachable_portal_exits_with_connection_code() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/live"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut cmd = portal_cmd(&dir, &server);
    cmd.args(["fetch", "-e", "/live"]);
    let output = run(cmd).await;
    assert_eq!(output.status.code(), Some(7), "{}", combined_output(&output));
}

// ── Watch ───────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_watch_stops_after_count() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    mount_live(&server).await;

    let mut cmd = portal_cmd(&dir, &server);
    cmd.args(["--output", "json-compact", "watch", "-e", "/live", "--count", "1"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let first = stdout.lines().next().unwrap();
    let snapshot: serde_json::Value = serde_json::from_str(first).unwrap();
    assert_eq!(snapshot["lastGood"]["currentPower"], json!(1520.0));
    assert_eq!(snapshot["retryCount"], json!(0));
}

#[test]
fn test_watch_rejects_bad_interval() {
    let dir = tempfile::tempdir().unwrap();
    let cookie = cookie_file(&dir, "SESSION=abc123\n");
    sunprobe_cmd(dir.path())
        .args(["--portal", "http://127.0.0.1:9", "--cookie-file"])
        .arg(cookie)
        .args(["watch", "--interval", "soon"])
        .assert()
        .code(2);
}

// ── History ─────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_history_month_plain() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/plants"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "plantId": "P-1" }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/plants/P-1/measurements"))
        .and(query_param("from", "2024-06-01T00:00:00Z"))
        .and(query_param("resolution", "day"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "measurements": [
                { "timestamp": "2024-06-01T00:00:00Z", "energy": 21.5 },
                { "timestamp": "2024-06-02T00:00:00Z", "energy": 19 }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut cmd = portal_cmd(&dir, &server);
    cmd.args(["--output", "plain", "history", "month", "--date", "2024-06-15"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "2024-06-01T00:00:00Z 21.5\n2024-06-02T00:00:00Z 19"
    );
}

#[test]
fn test_history_rejects_bad_date() {
    let dir = tempfile::tempdir().unwrap();
    sunprobe_cmd(dir.path())
        .args(["history", "day", "--date", "15.06.2024"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("YYYY-MM-DD"));
}

#[test]
fn test_history_rejects_unknown_period() {
    let dir = tempfile::tempdir().unwrap();
    sunprobe_cmd(dir.path())
        .args(["history", "week"])
        .assert()
        .code(2);
}

// ── Login ───────────────────────────────────────────────────────────

async fn mount_login(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<form method="post" action="/auth/login">
                 <input type="hidden" name="csrf" value="tok-1">
                 <input type="password" name="password">
               </form>"#,
            "text/html",
        ))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_string_contains("username=alice"))
        .and(body_string_contains("password=hunter2"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "SESSION=fresh; Path=/")
                .set_body_raw("<html>dashboard</html>", "text/html"),
        )
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_login_writes_cookie_file() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    mount_login(&server).await;
    let target = dir.path().join("session").join("cookie.txt");

    let mut cmd = sunprobe_cmd(dir.path());
    cmd.env("SUNPROBE_USERNAME", "alice")
        .env("SUNPROBE_PASSWORD", "hunter2")
        .arg("--portal")
        .arg(server.uri())
        .arg("--cookie-file")
        .arg(&target)
        .arg("login");
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let stored = std::fs::read_to_string(&target).unwrap();
    assert!(stored.contains("SESSION=fresh"), "{stored}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_login_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    mount_login(&server).await;

    let mut cmd = sunprobe_cmd(dir.path());
    cmd.env("SUNPROBE_USERNAME", "alice")
        .env("SUNPROBE_PASSWORD", "hunter2")
        .arg("--portal")
        .arg(server.uri())
        .args(["login", "--store", "stdout"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    assert!(String::from_utf8_lossy(&output.stdout).contains("SESSION=fresh"));
}

#[test]
fn test_login_without_username_is_credentials_error() {
    let dir = tempfile::tempdir().unwrap();
    sunprobe_cmd(dir.path())
        .args(["--portal", "http://127.0.0.1:9", "login"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("No credentials"));
}
