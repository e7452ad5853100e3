use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use serde_json::{json, Value};
use tempfile::TempDir;

fn keel_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("keel"));
    cmd.env_remove("KEEL_ENDPOINT")
        .env_remove("KEEL_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir");
    }
    fs::write(path, content).expect("write");
}

fn project() -> TempDir {
    let tmp = TempDir::new().expect("tempdir");
    write(
        tmp.path(),
        "project.json",
        &json!({
            "name": "shop",
            "title": "Shop",
            "capabilities": [{"name": "db", "payload": {"__type__": "database", "schema": "public"}}],
            "instances": [{"pluginName": "stripe", "name": "pay", "config": {"token": "a"}, "capabilityNames": ["db"]}]
        })
        .to_string(),
    );
    tmp
}

fn init(dir: &TempDir) {
    keel_cmd()
        .args(["init", "--remote-id", "p-123"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(contains("p-123"));
}

fn status_json(dir: &TempDir) -> Value {
    let assert = keel_cmd()
        .args(["status", "--json"])
        .arg(dir.path())
        .assert()
        .success();
    serde_json::from_slice(&assert.get_output().stdout).expect("status JSON")
}

#[test]
fn init_creates_state_cache_and_is_idempotent() {
    let dir = project();
    init(&dir);
    assert!(dir.path().join(".keel/state.db").is_file());

    keel_cmd()
        .args(["init", "--remote-id", "p-123"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(contains("Already bound"));

    keel_cmd()
        .args(["init", "--remote-id", "other"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(contains("already bound"));
}

#[test]
fn init_without_project_json_fails() {
    let dir = TempDir::new().expect("tempdir");
    keel_cmd()
        .args(["init", "--remote-id", "p-1"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(contains("project.json"));
    assert!(!dir.path().join(".keel").exists());
}

#[test]
fn status_requires_provisioning() {
    let dir = project();
    keel_cmd()
        .arg("status")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(contains("keel init"));
}

#[test]
fn status_after_init_is_clean() {
    let dir = project();
    init(&dir);
    keel_cmd()
        .arg("status")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(contains("Everything up to date"));

    let status = status_json(&dir);
    assert_eq!(status["remoteId"], json!("p-123"));
    assert_eq!(status["changes"], json!([]));
    assert!(status.get("configPatch").is_none());
}

#[test]
fn status_json_lists_pending_changes() {
    let dir = project();
    init(&dir);
    write(dir.path(), "migrations/202301010000_init.sql", "create table t();");
    write(dir.path(), "functions/api/index.ts", "export default 1;");
    write(dir.path(), "workflows/nightly.json", r#"{"name": "nightly"}"#);

    let status = status_json(&dir);
    let changes = status["changes"].as_array().expect("changes");
    let keys: Vec<(&str, &str)> = changes
        .iter()
        .map(|c| {
            (
                c["category"].as_str().expect("category"),
                c["key"].as_str().expect("key"),
            )
        })
        .collect();
    assert_eq!(
        keys,
        vec![
            ("migrations", "202301010000_init.sql"),
            ("functions", "api"),
            ("functions", "api/index.ts"),
            ("workflows", "nightly"),
        ]
    );
    assert!(changes.iter().all(|c| c["kind"] == json!("created")));
}

#[test]
fn status_only_filter_and_invalid_migration() {
    let dir = project();
    init(&dir);
    write(dir.path(), "migrations/bad-name.sql", "select 1;");
    write(dir.path(), "workflows/w.json", r#"{"name": "w"}"#);

    keel_cmd()
        .args(["status", "--json", "--only", "workflows"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(contains("\"w\""));

    keel_cmd()
        .arg("status")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(contains("bad-name.sql"));

    keel_cmd()
        .args(["status", "--only", "nonsense"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(contains("unknown category"));
}

#[test]
fn diff_shows_text_diff_and_compiled_patch() {
    let dir = project();
    init(&dir);

    keel_cmd()
        .arg("diff")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(contains("No configuration changes."));

    write(
        dir.path(),
        "project.json",
        &json!({
            "name": "shop",
            "title": "Shop",
            "capabilities": [{"name": "db", "payload": {"__type__": "database", "schema": "public"}}],
            "instances": [{"pluginName": "stripe", "name": "pay", "config": {"token": "a", "extra": "b"}, "capabilityNames": ["db"]}]
        })
        .to_string(),
    );

    let assert = keel_cmd()
        .arg("diff")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(contains("a/project.json"))
        .stdout(contains("\"op\": \"update\""));
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    assert!(stdout
        .lines()
        .any(|line| line.starts_with('+') && line.contains("\"extra\"")));
}

#[test]
fn reordered_lists_are_not_a_change() {
    let dir = project();
    write(
        dir.path(),
        "project.json",
        &json!({
            "name": "shop",
            "capabilities": [
                {"name": "a", "payload": {"__type__": "database", "schema": "x"}},
                {"name": "b", "payload": {"__type__": "database", "schema": "y"}}
            ]
        })
        .to_string(),
    );
    init(&dir);
    write(
        dir.path(),
        "project.json",
        &json!({
            "name": "shop",
            "capabilities": [
                {"name": "b", "payload": {"__type__": "database", "schema": "y"}},
                {"name": "a", "payload": {"__type__": "database", "schema": "x"}}
            ]
        })
        .to_string(),
    );

    keel_cmd()
        .arg("diff")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(contains("No configuration changes."));
}

#[test]
fn push_requires_an_endpoint() {
    let dir = project();
    init(&dir);
    keel_cmd()
        .arg("push")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(contains("--endpoint").or(contains("KEEL_ENDPOINT")));
}

#[test]
fn unreachable_remote_rejects_without_touching_the_cache() {
    let dir = project();
    init(&dir);
    write(dir.path(), "migrations/202301010000_init.sql", "select 1;");

    keel_cmd()
        .args(["push", "--endpoint", "http://127.0.0.1:9"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(contains("migrations:202301010000_init.sql"))
        .stderr(contains("rejected"));

    let status = status_json(&dir);
    assert_eq!(status["changes"][0]["key"], json!("202301010000_init.sql"));
}

#[test]
fn verbose_push_logs_the_run() {
    let dir = project();
    init(&dir);

    keel_cmd()
        .args(["-v", "push", "--endpoint", "http://127.0.0.1:9"])
        .arg(dir.path())
        .assert()
        .success()
        .stderr(contains("starting push"));
}
