//! CLI integration tests.
//!
//! These tests run the `lw` binary against git repositories created in
//! temp directories.

use std::path::Path;
use std::process::Command as StdCommand;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a command for running lw with config isolated from the user's.
fn lw(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("lw").unwrap();
    cmd.current_dir(dir)
        .env_remove("RUST_LOG")
        .env("LATCHWORK_CONFIG", dir.join("no-such-config.toml"))
        .env("XDG_CONFIG_HOME", dir.join("no-such-xdg"))
        .env("HOME", dir);
    cmd
}

fn git(dir: &Path, args: &[&str]) -> String {
    let output = StdCommand::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A repository with two commits touching `notes.txt`.
fn sample_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    let path = dir.path();
    git(path, &["init", "-q", "-b", "main"]);
    git(path, &["config", "user.email", "test@example.com"]);
    git(path, &["config", "user.name", "Test User"]);

    std::fs::write(path.join("notes.txt"), "alpha\n").unwrap();
    git(path, &["add", "notes.txt"]);
    git(path, &["commit", "-q", "-m", "add notes"]);

    std::fs::create_dir_all(path.join("docs")).unwrap();
    std::fs::write(path.join("notes.txt"), "alpha\nbeta\n").unwrap();
    std::fs::write(path.join("docs/guide.md"), "# guide\n").unwrap();
    git(path, &["add", "-A"]);
    git(path, &["commit", "-q", "-m", "extend notes"]);
    dir
}

#[test]
fn version_flag_works() {
    Command::cargo_bin("lw")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("lw"));
}

#[test]
fn help_lists_commands() {
    Command::cargo_bin("lw")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("diff-blobs"))
        .stdout(predicate::str::contains("history"));
}

#[test]
fn outside_a_repository_fails() {
    let dir = TempDir::new().unwrap();
    lw(dir.path())
        .arg("refs")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn refs_lists_branches() {
    let repo = sample_repo();
    let head = git(repo.path(), &["rev-parse", "HEAD"]);

    lw(repo.path())
        .arg("refs")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("{} refs/heads/main", &head[..7])));
}

#[test]
fn refs_lookup_marks_missing_names() {
    let repo = sample_repo();

    lw(repo.path())
        .args(["refs", "main", "nope"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nope: not found"))
        .stdout(predicate::str::contains("main:"));
}

#[test]
fn paths_json_is_a_list() {
    let repo = sample_repo();

    let output = lw(repo.path())
        .args(["paths", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let paths: Vec<String> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(paths, vec!["docs/guide.md", "notes.txt"]);
}

#[test]
fn cwd_flag_selects_repository() {
    let repo = sample_repo();
    let elsewhere = TempDir::new().unwrap();

    lw(elsewhere.path())
        .arg("--cwd")
        .arg(repo.path())
        .args(["paths", "HEAD~1"])
        .assert()
        .success()
        .stdout(predicate::eq("notes.txt\n"));
}

#[test]
fn diff_blobs_shows_added_line() {
    let repo = sample_repo();

    lw(repo.path())
        .args(["diff-blobs", "HEAD~1:notes.txt", "HEAD:notes.txt", "--context", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("+           2"));
}

#[test]
fn diff_blobs_rejects_non_blob() {
    let repo = sample_repo();

    lw(repo.path())
        .args(["diff-blobs", "HEAD", "HEAD:notes.txt"])
        .assert()
        .failure();
}

#[test]
fn history_lists_changes_newest_first() {
    let repo = sample_repo();

    let output = lw(repo.path())
        .args(["history", "notes.txt", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let history: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let statuses: Vec<&str> = history["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["modified", "added"]);
    assert_eq!(history["reached_end_of_history"], true);
}

#[test]
fn history_respects_max_count() {
    let repo = sample_repo();

    lw(repo.path())
        .args(["history", "notes.txt", "-n", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("extend notes"))
        .stdout(predicate::str::contains("more history available"));
}

#[test]
fn history_continues_from_resume_point() {
    let repo = sample_repo();
    let parent = git(repo.path(), &["rev-parse", "HEAD~1"]);

    let output = lw(repo.path())
        .args(["history", "notes.txt", "-n", "1", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let first: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(first["reached_end_of_history"], false);
    assert_eq!(first["resume_from"], serde_json::json!([parent]));

    lw(repo.path())
        .args(["history", "notes.txt", "--from", parent.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("add notes"))
        .stdout(predicate::str::contains("extend notes").not())
        .stdout(predicate::str::contains("more history available").not());
}

#[test]
fn history_rejects_zero_max_count() {
    let repo = sample_repo();

    lw(repo.path())
        .args(["history", "notes.txt", "--max-count", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("max count"));
}

#[test]
fn index_lists_staged_entries() {
    let repo = sample_repo();

    lw(repo.path())
        .arg("index")
        .assert()
        .success()
        .stdout(predicate::str::contains("100644"))
        .stdout(predicate::str::contains("\tdocs/guide.md"));
}

#[test]
fn remotes_and_submodules_empty() {
    let repo = sample_repo();

    lw(repo.path())
        .args(["remotes", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));

    lw(repo.path())
        .arg("submodules")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn zero_workers_flag_fails() {
    let repo = sample_repo();

    lw(repo.path())
        .args(["--workers", "0", "paths"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("worker pool size"));
}

#[test]
fn repo_config_is_applied() {
    let repo = sample_repo();
    let config_dir = repo.path().join(".git/latchwork");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.toml"),
        "[scheduler]\nworker_threads = 2\n\n[locking]\nthread_safety = \"disabled\"\n",
    )
    .unwrap();

    lw(repo.path()).arg("paths").assert().success();

    std::fs::write(config_dir.join("config.toml"), "[scheduler]\nworker_threads = 0\n").unwrap();
    lw(repo.path())
        .arg("paths")
        .assert()
        .failure()
        .stderr(predicate::str::contains("worker_threads"));
}

#[test]
fn debug_flag_logs_repository_discovery() {
    let repo = sample_repo();

    lw(repo.path())
        .args(["--debug", "paths"])
        .assert()
        .success()
        .stderr(predicate::str::contains("opened repository"));
}

#[test]
fn repo_log_level_applies_after_discovery() {
    let repo = sample_repo();
    let config_dir = repo.path().join(".git/latchwork");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("config.toml"), "log_level = \"debug\"\n").unwrap();

    lw(repo.path())
        .arg("paths")
        .assert()
        .success()
        .stderr(predicate::str::contains("command finished"));

    std::fs::write(config_dir.join("config.toml"), "log_level = \"warn\"\n").unwrap();
    lw(repo.path())
        .arg("paths")
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
}
