use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::{Duration, SystemTime};

use assert_cmd::prelude::*;
use filetime::{set_file_mtime, FileTime};
use predicates::str::contains;
use tempfile::TempDir;

fn vellum_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("vellum"));
    cmd.current_dir(dir);
    cmd
}

fn render_page(root: &Path) {
    let tpl = root.join("tpl");
    fs::create_dir_all(&tpl).expect("create template dir");
    fs::write(tpl.join("page.tpl"), "Hello {$name}!").expect("write template");
    vellum_cmd(root)
        .args(["render", "page", "--set", "name=World"])
        .assert()
        .success();
}

fn age_file(path: &Path, secs_ago: u64) {
    let then = SystemTime::now() - Duration::from_secs(secs_ago);
    set_file_mtime(path, FileTime::from_system_time(then)).expect("set mtime");
}

#[test]
fn status_reports_an_empty_cache() {
    let root = TempDir::new().expect("tempdir");

    vellum_cmd(root.path())
        .arg("status")
        .assert()
        .success()
        .stdout(contains("Cache is empty."));
}

#[test]
fn status_lists_compiled_artifacts() {
    let root = TempDir::new().expect("tempdir");
    render_page(root.path());

    vellum_cmd(root.path())
        .arg("status")
        .assert()
        .success()
        .stdout(contains("page."))
        .stdout(contains("template"))
        .stdout(contains("1 artifacts"));
}

#[test]
fn status_json_has_a_stable_schema() {
    let root = TempDir::new().expect("tempdir");
    render_page(root.path());

    let assert = vellum_cmd(root.path())
        .args(["status", "--json"])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("stdout utf8");
    let payload: serde_json::Value = serde_json::from_str(&stdout).expect("parse status json");

    assert!(payload["cache_dir"].is_string());
    let rows = payload["artifacts"].as_array().expect("artifacts array");
    assert_eq!(rows.len(), 1);
    let row = rows[0].as_object().expect("artifact object");
    for key in ["name", "kind", "size_bytes", "age_secs"] {
        assert!(row.contains_key(key), "missing key {key}");
    }
    assert_eq!(rows[0]["kind"], "template");
}

#[test]
fn clean_removes_only_artifacts_past_the_age_threshold() {
    let root = TempDir::new().expect("tempdir");
    render_page(root.path());

    let cache = root.path().join("cache");
    let fresh: Vec<_> = fs::read_dir(&cache)
        .expect("read cache")
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    assert_eq!(fresh.len(), 1);

    let stale = cache.join("stale.0000.vtc");
    fs::write(&stale, "old artifact").expect("write stale file");
    age_file(&stale, 7200);

    vellum_cmd(root.path())
        .args(["clean", "--max-age", "3600"])
        .assert()
        .success()
        .stdout(contains("removed 1 artifact"))
        .stdout(contains("stale.0000.vtc"));

    assert!(!stale.exists(), "stale artifact should be removed");
    assert!(fresh[0].exists(), "fresh artifact should survive");
}

#[test]
fn clean_on_a_missing_cache_dir_is_a_no_op() {
    let root = TempDir::new().expect("tempdir");

    vellum_cmd(root.path())
        .args(["clean", "--max-age", "0"])
        .assert()
        .success()
        .stdout(contains("Nothing to clean"));
}
