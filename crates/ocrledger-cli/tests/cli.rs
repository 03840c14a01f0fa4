//! End-to-end checks for the command-line surface. Nothing here talks to
//! a provider; these exercise argument parsing and the offline commands.

use assert_cmd::Command;
use predicates::prelude::*;

fn ocrledger() -> Command {
    Command::cargo_bin("ocrledger").unwrap()
}

#[test]
fn help_lists_every_subcommand() {
    ocrledger()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("ingest")
                .and(predicate::str::contains("send"))
                .and(predicate::str::contains("records"))
                .and(predicate::str::contains("config")),
        );
}

#[test]
fn ingest_requires_a_kind() {
    ocrledger()
        .args(["ingest", "*.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--kind"));
}

#[test]
fn ingest_fails_cleanly_on_an_empty_glob() {
    let dir = tempfile::tempdir().unwrap();
    let pattern = dir.path().join("*.png");

    ocrledger()
        .args(["ingest", pattern.to_str().unwrap(), "--kind", "bank-slip"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No matching files"));
}

#[test]
fn config_init_writes_a_loadable_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");

    ocrledger()
        .args(["config", "init", "--output", path.to_str().unwrap()])
        .assert()
        .success();

    let raw = std::fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["ingest"]["max_batch_size"], 5);
}

#[test]
fn config_init_refuses_to_clobber_without_force() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{}").unwrap();

    ocrledger()
        .args(["config", "init", "--output", path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn send_rejects_a_missing_records_file() {
    ocrledger()
        .args(["send", "/no/such/records.json"])
        .assert()
        .failure();
}
