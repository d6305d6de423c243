//! CLI smoke tests

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn write_config(dir: &TempDir) -> std::path::PathBuf {
    let db_path = dir.path().join("rag.db");
    let config_path = dir.path().join("rag.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
[llm]
executable_path = "/usr/bin/true"
model_path = "/etc/hostname"

[store]
connection_string = "file:{}"
active_collection = "rules"
"#,
            db_path.display()
        ),
    )
    .unwrap();
    config_path
}

#[test]
fn test_config_validate_accepts_complete_config() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);

    Command::cargo_bin("rag-cli")
        .unwrap()
        .args(["--config"])
        .arg(&config)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("configuration is valid"));
}

#[test]
fn test_config_validate_rejects_missing_llm_paths() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("rag.toml");
    std::fs::write(&config_path, "[llm]\nexecutable_path = \"\"\nmodel_path = \"\"\n").unwrap();

    Command::cargo_bin("rag-cli")
        .unwrap()
        .args(["--config"])
        .arg(&config_path)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration"));
}

#[test]
fn test_config_show_prints_defaults() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);

    Command::cargo_bin("rag-cli")
        .unwrap()
        .args(["--config"])
        .arg(&config)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("max_instances = 3"))
        .stdout(predicate::str::contains("dimension = 768"));
}

#[test]
fn test_collections_list_empty_store() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);

    Command::cargo_bin("rag-cli")
        .unwrap()
        .args(["--config"])
        .arg(&config)
        .args(["collections", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no collections"));
}

#[test]
fn test_ingest_then_stats_round_trip() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);

    let fragments = dir.path().join("fragments.json");
    std::fs::write(
        &fragments,
        r#"[
            {"category": "Combat", "content": "Roll 2d6 to attack.", "source_file": null},
            {"category": "Magic", "content": "Spend mana to cast.", "source_file": null}
        ]"#,
    )
    .unwrap();

    Command::cargo_bin("rag-cli")
        .unwrap()
        .args(["--config"])
        .arg(&config)
        .args(["ingest"])
        .arg(&fragments)
        .args(["--collection", "rules"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ingested 2 fragments"));

    Command::cargo_bin("rag-cli")
        .unwrap()
        .args(["--config"])
        .arg(&config)
        .args(["--format", "json", "collections", "stats", "rules"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"fragment_count\": 2"))
        .stdout(predicate::str::contains("\"embedded_count\": 2"));
}
