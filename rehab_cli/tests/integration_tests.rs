use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const DATE: &str = "2024-01-15";

const CONFIG: &str = r#"
[timing]
prepare_seconds = 1
hold_cue_seconds = 1
completion_delay_ms = 0

[exercises.bridge]
mode = "reps"
hold_time = 2
reps_schema = [2, 2]
rest_time = 1

[exercises.bird_dog]
mode = "reps"
hold_time = 1
reps_schema = [1]
rest_time = 0

[exercises.walk]
mode = "walk"
duration = 1
sessions = 2
"#;

fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("rehab"))
}

/// Temp data dir plus a config with short timings
fn setup_test_dir() -> (TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, CONFIG).expect("Failed to write config");
    (temp_dir, config_path)
}

fn rehab(data_dir: &Path, config: &Path) -> Command {
    let mut cmd = cli();
    cmd.arg("--data-dir")
        .arg(data_dir)
        .arg("--config")
        .arg(config)
        .arg("--date")
        .arg(DATE);
    cmd
}

fn progress_file(data_dir: &Path, exercise: &str) -> PathBuf {
    data_dir
        .join("records")
        .join(format!("exercise_progress_{}_{}.json", exercise, DATE))
}

fn read_json(path: &Path) -> serde_json::Value {
    let contents = fs::read_to_string(path).expect("Failed to read record");
    serde_json::from_str(&contents).expect("Record is not valid JSON")
}

#[test]
fn test_help_command() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("rehabilitation exercise timer"));
}

#[test]
fn test_run_help_lists_flags() {
    cli()
        .arg("run")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--fast"))
        .stdout(predicate::str::contains("--max-ticks"))
        .stdout(predicate::str::contains("--auto-continue"));
}

#[test]
fn test_list_shows_catalog() {
    cli()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("bird_dog"))
        .stdout(predicate::str::contains("two sides"))
        .stdout(predicate::str::contains("foam_roll"));
}

#[test]
fn test_status_without_assignment() {
    let (temp_dir, config) = setup_test_dir();

    rehab(temp_dir.path(), &config)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No exercises assigned for 2024-01-15"));
}

#[test]
fn test_assign_writes_daily_list() {
    let (temp_dir, config) = setup_test_dir();

    rehab(temp_dir.path(), &config)
        .arg("assign")
        .arg("bridge")
        .arg("walk")
        .assert()
        .success()
        .stdout(predicate::str::contains("Assigned 2 exercises for 2024-01-15"));

    let list = read_json(&temp_dir.path().join("records/exercises_2024-01-15.json"));
    assert_eq!(list[0]["exercise_type"], "bridge");
    assert_eq!(list[0]["completed"], false);
    assert_eq!(list[1]["exercise_type"], "walk");

    rehab(temp_dir.path(), &config)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("[ ] Glute Bridge"))
        .stdout(predicate::str::contains("[ ] Walk"));
}

#[test]
fn test_assign_unknown_exercise_warns() {
    let (temp_dir, config) = setup_test_dir();

    rehab(temp_dir.path(), &config)
        .arg("assign")
        .arg("wall_sit")
        .assert()
        .success()
        .stderr(predicate::str::contains("Unknown exercise: wall_sit"));
}

#[test]
fn test_run_to_completion_marks_daily_list() {
    let (temp_dir, config) = setup_test_dir();

    rehab(temp_dir.path(), &config)
        .arg("assign")
        .arg("bridge")
        .assert()
        .success();

    rehab(temp_dir.path(), &config)
        .arg("run")
        .arg("bridge")
        .arg("--fast")
        .assert()
        .success()
        .stdout(predicate::str::contains("hold (set 1, rep 1)"))
        .stdout(predicate::str::contains("Rest before set 2"))
        .stdout(predicate::str::contains("Glute Bridge complete!"));

    assert!(!progress_file(temp_dir.path(), "bridge").exists());

    rehab(temp_dir.path(), &config)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("[x] Glute Bridge"));
}

#[test]
fn test_completed_exercise_is_not_rerun() {
    let (temp_dir, config) = setup_test_dir();

    rehab(temp_dir.path(), &config)
        .arg("assign")
        .arg("bridge")
        .assert()
        .success();

    rehab(temp_dir.path(), &config)
        .arg("run")
        .arg("bridge")
        .arg("--fast")
        .assert()
        .success();

    rehab(temp_dir.path(), &config)
        .arg("run")
        .arg("bridge")
        .arg("--fast")
        .assert()
        .success()
        .stdout(predicate::str::contains("already completed today"))
        .stdout(predicate::str::contains("complete!").not());
}

#[test]
fn test_stopped_run_resumes_where_it_left_off() {
    let (temp_dir, config) = setup_test_dir();

    rehab(temp_dir.path(), &config)
        .arg("assign")
        .arg("bridge")
        .assert()
        .success();

    // Prepare (1s), rep 1 (2s), then one second into rep 2
    rehab(temp_dir.path(), &config)
        .arg("run")
        .arg("bridge")
        .arg("--fast")
        .arg("--max-ticks")
        .arg("4")
        .assert()
        .success()
        .stdout(predicate::str::contains("Stopped after 4 ticks"));

    let saved = read_json(&progress_file(temp_dir.path(), "bridge"));
    assert_eq!(saved["exercise_type"], "bridge");
    assert_eq!(saved["current_set"], 1);
    assert_eq!(saved["current_rep"], 2);

    rehab(temp_dir.path(), &config)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("in progress: set 1 rep 2"));

    rehab(temp_dir.path(), &config)
        .arg("run")
        .arg("bridge")
        .arg("--fast")
        .assert()
        .success()
        .stdout(predicate::str::contains("Resuming at set 1 rep 2"))
        .stdout(predicate::str::contains("Glute Bridge complete!"));
}

#[test]
fn test_clear_discards_progress() {
    let (temp_dir, config) = setup_test_dir();

    rehab(temp_dir.path(), &config)
        .arg("run")
        .arg("bridge")
        .arg("--fast")
        .arg("--max-ticks")
        .arg("2")
        .assert()
        .success();

    assert!(progress_file(temp_dir.path(), "bridge").exists());

    rehab(temp_dir.path(), &config)
        .arg("clear")
        .arg("bridge")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared progress for bridge"));

    assert!(!progress_file(temp_dir.path(), "bridge").exists());

    rehab(temp_dir.path(), &config)
        .arg("run")
        .arg("bridge")
        .arg("--fast")
        .assert()
        .success()
        .stdout(predicate::str::contains("Resuming").not());
}

#[test]
fn test_dual_scheme_waits_for_continue() {
    let (temp_dir, config) = setup_test_dir();

    // Closed stdin stops the session at the scheme break
    rehab(temp_dir.path(), &config)
        .arg("run")
        .arg("bird_dog")
        .arg("--fast")
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains("Press Enter to continue"))
        .stdout(predicate::str::contains("Session stopped"));

    let saved = read_json(&progress_file(temp_dir.path(), "bird_dog"));
    assert_eq!(saved["current_scheme"], 2);
    assert_eq!(saved["scheme_one_completed"], true);

    rehab(temp_dir.path(), &config)
        .arg("run")
        .arg("bird_dog")
        .arg("--fast")
        .assert()
        .success()
        .stdout(predicate::str::contains("Right arm, left leg"))
        .stdout(predicate::str::contains("Bird Dog complete!"));
}

#[test]
fn test_dual_scheme_auto_continue() {
    let (temp_dir, config) = setup_test_dir();

    rehab(temp_dir.path(), &config)
        .arg("run")
        .arg("bird_dog")
        .arg("--fast")
        .arg("--auto-continue")
        .assert()
        .success()
        .stdout(predicate::str::contains("Continuing..."))
        .stdout(predicate::str::contains("Bird Dog complete!"));
}

#[test]
fn test_walk_sessions() {
    let (temp_dir, config) = setup_test_dir();

    rehab(temp_dir.path(), &config)
        .arg("run")
        .arg("walk")
        .arg("--fast")
        .arg("--auto-continue")
        .assert()
        .success()
        .stdout(predicate::str::contains("Next: session 2 of 2"))
        .stdout(predicate::str::contains("Walk complete!"));
}

#[test]
fn test_walk_resumes_at_next_session() {
    let (temp_dir, config) = setup_test_dir();

    rehab(temp_dir.path(), &config)
        .arg("run")
        .arg("walk")
        .arg("--fast")
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains("Next: session 2 of 2"))
        .stdout(predicate::str::contains("Session stopped"));

    let saved = read_json(&progress_file(temp_dir.path(), "walk"));
    assert_eq!(saved["current_session"], 2);

    rehab(temp_dir.path(), &config)
        .arg("run")
        .arg("walk")
        .arg("--fast")
        .assert()
        .success()
        .stdout(predicate::str::contains("Resuming at walk session 2 of 2"))
        .stdout(predicate::str::contains("Walk complete!"));
}

#[test]
fn test_dates_are_independent() {
    let (temp_dir, config) = setup_test_dir();

    rehab(temp_dir.path(), &config)
        .arg("assign")
        .arg("bridge")
        .assert()
        .success();

    cli()
        .arg("--data-dir")
        .arg(temp_dir.path())
        .arg("--config")
        .arg(&config)
        .arg("--date")
        .arg("2024-01-16")
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No exercises assigned for 2024-01-16"));
}

#[test]
fn test_clear_rejects_unsafe_names() {
    let (temp_dir, config) = setup_test_dir();

    rehab(temp_dir.path(), &config)
        .arg("clear")
        .arg("../escape")
        .assert()
        .failure();
}
