use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn articles_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("articles");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let content_dir = root.join("content");
    fs::create_dir_all(content_dir.join("guides")).unwrap();
    fs::write(
        content_dir.join("getting_started.md"),
        "---\ntitle: Getting Started\nauthor: Ada\ntags: [intro, basics]\n---\n\
         Welcome! This article explains how to install rust with cargo.",
    )
    .unwrap();
    fs::write(
        content_dir.join("guides/kubernetes_tips.md"),
        "# Kubernetes tips\n\nRunning docker containers on kubernetes in production.",
    )
    .unwrap();
    fs::write(
        content_dir.join("scratch.txt"),
        "Loose notes about sqlite performance.",
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/articles.sqlite"

[content]
root = "{root}/content"

[pipeline]
startup_delay_ms = 0

[server]
bind = "127.0.0.1:7349"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("articles.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_articles(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = articles_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("ARTICLES_FORCE_LOAD")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run articles binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_articles(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_articles(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_articles(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_loads_empty_store() {
    let (_tmp, config_path) = setup_test_env();

    run_articles(&config_path, &["init"]);
    let (stdout, stderr, success) = run_articles(&config_path, &["ingest"]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("discovered: 3"));
    assert!(stdout.contains("inserted: 3"));
    assert!(stdout.contains("failed: 0"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_ingest_gate_skips_populated_store() {
    let (_tmp, config_path) = setup_test_env();

    run_articles(&config_path, &["ingest"]);
    let (stdout, _, success) = run_articles(&config_path, &["ingest"]);
    assert!(success);
    assert!(stdout.contains("ingest skipped"));
}

#[test]
fn test_ingest_force_is_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout1, _, _) = run_articles(&config_path, &["ingest", "--force"]);
    assert!(stdout1.contains("inserted: 3"));

    let (stdout2, _, success) = run_articles(&config_path, &["ingest", "--force"]);
    assert!(success);
    assert!(stdout2.contains("inserted: 0"));
    assert!(stdout2.contains("unchanged: 3"));
}

#[test]
fn test_ingest_reports_bad_document() {
    let (tmp, config_path) = setup_test_env();
    fs::write(
        tmp.path().join("content/broken.md"),
        "---\ntitle: Broken\nread_time: soon\n---\nbody",
    )
    .unwrap();

    let (stdout, stderr, success) = run_articles(&config_path, &["ingest"]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("inserted: 3"));
    assert!(stdout.contains("failed: 1"));
    assert!(stdout.contains("broken.md [parse]"));
}

#[test]
fn test_ingest_dry_run_writes_nothing() {
    let (_tmp, config_path) = setup_test_env();

    run_articles(&config_path, &["init"]);
    let (stdout, _, success) = run_articles(&config_path, &["ingest", "--dry-run"]);
    assert!(success);
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("getting_started.md -> getting-started"));
    assert!(stdout.contains("featured"));

    let (stdout, _, _) = run_articles(&config_path, &["stats"]);
    assert!(stdout.contains("Articles:    0"));
}

#[test]
fn test_get_article() {
    let (_tmp, config_path) = setup_test_env();

    run_articles(&config_path, &["ingest"]);
    let (stdout, stderr, success) = run_articles(&config_path, &["get", "kubernetes-tips"]);
    assert!(success, "get failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("title:        Kubernetes tips"));
    assert!(stdout.contains("kubernetes"));
    assert!(stdout.contains("--- Body ---"));
}

#[test]
fn test_get_missing_article() {
    let (_tmp, config_path) = setup_test_env();

    run_articles(&config_path, &["init"]);
    let (_, stderr, success) = run_articles(&config_path, &["get", "nope"]);
    assert!(!success);
    assert!(stderr.contains("article not found"));
}

#[test]
fn test_stats_after_ingest() {
    let (_tmp, config_path) = setup_test_env();

    run_articles(&config_path, &["ingest"]);
    let (stdout, _, success) = run_articles(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Articles:    3"));
    assert!(stdout.contains("Featured:    1"));
    assert!(stdout.contains("Top tags:"));
}

#[test]
fn test_missing_content_root_fails() {
    let (tmp, config_path) = setup_test_env();
    fs::remove_dir_all(tmp.path().join("content")).unwrap();

    let (_, stderr, success) = run_articles(&config_path, &["ingest"]);
    assert!(!success);
    assert!(stderr.contains("content root does not exist"));
}

#[test]
fn test_invalid_config_rejected() {
    let (tmp, _) = setup_test_env();
    let bad = tmp.path().join("config/bad.toml");
    fs::write(
        &bad,
        format!(
            "[db]\npath = \"{0}/a.sqlite\"\n[content]\nroot = \"{0}\"\n[enrichment]\nprovider = \"openai\"\n",
            tmp.path().display()
        ),
    )
    .unwrap();

    let (_, stderr, success) = run_articles(&bad, &["init"]);
    assert!(!success);
    assert!(stderr.contains("enrichment.model"));
}
