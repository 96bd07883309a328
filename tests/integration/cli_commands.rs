//! Tests for the `tseq` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

use crate::support::sequence_file;

/// Get a Command instance for the tseq binary
#[allow(deprecated)]
fn tseq_cmd() -> Command {
    Command::cargo_bin("tseq").expect("Failed to find tseq binary")
}

#[test]
fn test_help_lists_commands() {
    tseq_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("show"))
        .stdout(predicate::str::contains("merge"))
        .stdout(predicate::str::contains("discover"));
}

#[test]
fn test_show_prints_sequence_summary() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("smoke.tjoy");
    fs::write(&path, sequence_file("smoke", &["test_boot", "test_shutdown"]))
        .expect("Failed to write sequence");

    tseq_cmd()
        .arg("show")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("smoke"))
        .stdout(predicate::str::contains("test_boot"))
        .stdout(predicate::str::contains("test_shutdown"))
        .stdout(predicate::str::contains("tests: 2"));
}

#[test]
fn test_show_reports_corrupt_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("broken.tjoy");
    fs::write(&path, "{ not a sequence").expect("Failed to write sequence");

    tseq_cmd()
        .arg("show")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("broken.tjoy"));
}

#[test]
fn test_merge_writes_combined_sequence() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let first = temp_dir.path().join("first.tjoy");
    let second = temp_dir.path().join("second.tjoy");
    fs::write(&first, sequence_file("first", &["test_a"])).expect("write");
    fs::write(&second, sequence_file("second", &["test_b", "test_c"])).expect("write");
    let out = temp_dir.path().join("combined.tjoy");

    tseq_cmd()
        .arg("merge")
        .arg(&out)
        .arg(&first)
        .arg(&second)
        .assert()
        .success()
        .stdout(predicate::str::contains("3 tests from 2 files"));

    let merged = fs::read_to_string(&out).expect("merged file");
    assert!(merged.contains("\"combined\""));
    for name in ["test_a", "test_b", "test_c"] {
        assert!(merged.contains(name), "missing {name}");
    }
}

#[test]
fn test_merge_refused_for_operator() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let first = temp_dir.path().join("first.tjoy");
    fs::write(&first, sequence_file("first", &["test_a"])).expect("write");
    let out = temp_dir.path().join("combined.tjoy");

    tseq_cmd()
        .args(["--role", "operator", "merge"])
        .arg(&out)
        .arg(&first)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Admin"));
    assert!(!out.exists());
}
