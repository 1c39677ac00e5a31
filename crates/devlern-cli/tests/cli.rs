use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

fn devlern(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("devlern").unwrap();
    cmd.env_remove("RUST_LOG")
        .arg("--table")
        .arg(dir.join("models/qtable.json"))
        .arg("--log")
        .arg(dir.join("logs/decisions.jsonl"))
        .arg("--seed")
        .arg("7");
    cmd
}

#[test]
fn actions_lists_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let output = devlern(dir.path()).arg("actions").assert().success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    assert_eq!(stdout.lines().count(), 54);
    assert!(stdout.lines().any(|l| l == "take_screenshot"));
    assert!(stdout.lines().any(|l| l == "scan_for_malware"));
}

#[test]
fn task_prints_result_and_saves_table() {
    let dir = tempfile::tempdir().unwrap();
    devlern(dir.path())
        .args(["task", "take screenshot", "--context", "display=2"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""intent":"take_screenshot""#))
        .stdout(predicate::str::contains(r#""state":"intent_take_screenshot_ctx_"#));

    assert!(dir.path().join("models/qtable.json").exists());
    assert!(dir.path().join("models/qtable.csv").exists());
    let log = fs::read_to_string(dir.path().join("logs/decisions.jsonl")).unwrap();
    assert_eq!(log.lines().count(), 2);
}

#[test]
fn feedback_is_learned_and_reported_by_stats() {
    let dir = tempfile::tempdir().unwrap();
    devlern(dir.path())
        .args([
            "--epsilon",
            "0",
            "task",
            "mute audio",
            "--feedback",
            "negative",
            "--suggest",
            "volume_down",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""feedback":"negative""#))
        .stdout(predicate::str::contains(r#""totalReward":0.5"#));

    devlern(dir.path())
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""totalStates": 1"#))
        .stdout(predicate::str::contains(r#""totalStateActionPairs": 2"#));

    devlern(dir.path())
        .args(["suggest", "mute the audio"])
        .assert()
        .success()
        .stdout(predicate::str::contains("volume_down"));
}

#[test]
fn empty_table_suggests_starters() {
    let dir = tempfile::tempdir().unwrap();
    devlern(dir.path())
        .arg("suggest")
        .assert()
        .success()
        .stdout(predicate::str::contains("take_screenshot"))
        .stdout(predicate::str::contains("show_system_info"));
}

#[test]
fn run_reads_tasks_and_feedback_from_stdin() {
    let dir = tempfile::tempdir().unwrap();
    devlern(dir.path())
        .arg("run")
        .write_stdin("lock my screen\n+\nstats\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("intent lock_screen"))
        .stdout(predicate::str::contains("positive feedback"))
        .stdout(predicate::str::contains("\"currentEpisode\": 0"));

    assert!(dir.path().join("models/qtable.json").exists());
}

#[test]
fn export_writes_csv() {
    let dir = tempfile::tempdir().unwrap();
    devlern(dir.path())
        .arg("export")
        .assert()
        .success()
        .stdout(predicate::str::contains("qtable.csv"));
    let csv = fs::read_to_string(dir.path().join("models/qtable.csv")).unwrap();
    assert!(csv.starts_with("state,action,value,visitCount,stateVisitTotal,lastUpdated"));
    assert!(dir.path().join("models/qtable_metadata.json").exists());
}

#[test]
fn invalid_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("devlern.json");
    fs::write(&config, "{ nope").unwrap();
    devlern(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid config"));
}
