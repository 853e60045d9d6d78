use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;

fn pagelens(config_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pagelens").unwrap();
    cmd.env_remove("RUST_LOG")
        .arg("--config")
        .arg(config_dir.join("absent.yaml"));
    cmd
}

fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

fn json_stdout(cmd: &mut Command) -> Value {
    let output = cmd.output().unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn chunk_splits_at_window_edges() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "digits.txt", "1234567890");
    let value = json_stdout(
        pagelens(dir.path())
            .arg("chunk")
            .arg(&file)
            .args(["--size", "5", "--overlap", "0", "--json"]),
    );
    assert_eq!(value["chunks"], serde_json::json!(["12345", "67890"]));
}

#[test]
fn chunk_prefers_paragraph_breaks() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(
        dir.path(),
        "para.md",
        "0123456789012\n\n4567890123456789",
    );
    let value = json_stdout(
        pagelens(dir.path())
            .arg("chunk")
            .arg(&file)
            .args(["--size", "20", "--overlap", "0", "--json"]),
    );
    assert_eq!(value["chunks"][0], "0123456789012");
}

#[test]
fn chunk_human_output_lists_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "short.txt", "hello page");
    let output = pagelens(dir.path())
        .arg("chunk")
        .arg(&file)
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("1 chunk(s)"));
    assert!(stdout.contains("--- chunk 0 (10 chars) ---\nhello page"));
}

fn lines(count: usize, changed: &[usize]) -> String {
    (0..count)
        .map(|i| {
            if changed.contains(&i) {
                format!("line {i} edited")
            } else {
                format!("line {i}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn diff_classifies_small_and_large_changes() {
    let dir = tempfile::tempdir().unwrap();
    let old = write(dir.path(), "old.md", &lines(10, &[]));
    let small = write(dir.path(), "small.md", &lines(10, &[4]));
    let large = write(dir.path(), "large.md", &lines(10, &[0, 2, 4, 6, 8]));

    let value = json_stdout(pagelens(dir.path()).arg("diff").arg(&old).arg(&small));
    assert_eq!(value["diff"]["kind"], "small_diff");
    assert_eq!(value["diff"]["changed_lines"], 2);
    assert!(value["diff"]["patch"]
        .as_str()
        .unwrap()
        .contains("+line 4 edited"));

    let value = json_stdout(pagelens(dir.path()).arg("diff").arg(&old).arg(&large));
    assert_eq!(value["diff"]["kind"], "large_diff");
    assert!(value["diff"].get("patch").is_none());
}

#[test]
fn diff_reports_navigation_and_identical_reads() {
    let dir = tempfile::tempdir().unwrap();
    let old = write(dir.path(), "old.md", "same text");
    let new = write(dir.path(), "new.md", "same text");

    let value = json_stdout(
        pagelens(dir.path())
            .arg("diff")
            .arg(&old)
            .arg(&new)
            .args(["--url", "https://a.test/", "--new-url", "https://b.test/"]),
    );
    assert_eq!(value["diff"]["kind"], "url_changed");
    assert_eq!(value["diff"]["previous_url"], "https://a.test/");

    let value = json_stdout(pagelens(dir.path()).arg("diff").arg(&old).arg(&new));
    assert_eq!(value["diff"]["kind"], "unchanged");
}

#[test]
fn config_prints_effective_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let output = pagelens(dir.path())
        .args(["config", "--endpoints"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("# defaults"));
    assert!(stdout.contains("max_rounds: 10"));
    assert!(stdout.contains("https://cloudcode-pa.googleapis.com"));
}

#[test]
fn invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = write(dir.path(), "bad.yaml", "snapshot:\n  small_diff_threshold: 2.0\n");
    Command::cargo_bin("pagelens")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .arg("config")
        .assert()
        .failure();
}
