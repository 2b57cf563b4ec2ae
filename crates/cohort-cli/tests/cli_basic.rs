//! End-to-end CLI tests.
//!
//! Each test runs the compiled binary against an isolated HOME so the
//! store and config land in a throwaway directory.

use std::path::Path;
use std::process::Command;

fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_cohort-cli"))
        .env("HOME", home)
        .env("COHORT_ENV", "dev")
        .args(args)
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_cli_success(home: &Path, args: &[&str]) -> String {
    let (stdout, stderr, code) = run_cli(home, args);
    assert_eq!(code, 0, "CLI command failed: {args:?}\nstderr: {stderr}");
    stdout
}

fn json_field(json: &str, field: &str) -> String {
    let value: serde_json::Value = serde_json::from_str(json).expect("invalid JSON output");
    value[field]
        .as_str()
        .unwrap_or_else(|| panic!("missing field {field} in {json}"))
        .to_string()
}

#[test]
fn create_schedule_reconcile_and_list_pending() {
    let home = tempfile::tempdir().unwrap();
    let home = home.path();

    let study = run_cli_success(
        home,
        &["study", "create", "Pilot study", "--timezone", "UTC"],
    );
    let study_id = json_field(&study, "id");

    let participant = run_cli_success(home, &["participant", "add", &study_id]);
    let participant_id = json_field(&participant, "id");

    let survey = run_cli_success(home, &["survey", "create", &study_id, "Weekly check-in"]);
    let survey_id = json_field(&survey, "id");

    run_cli_success(
        home,
        &["schedule", "add-weekly", &survey_id, "monday", "09:00"],
    );

    run_cli_success(home, &["reconcile", "survey", &survey_id]);

    let pending = run_cli_success(home, &["pending", "list", &survey_id]);
    let events: serde_json::Value = serde_json::from_str(&pending).unwrap();
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["participant_id"].as_str().unwrap(), participant_id);
}

#[test]
fn invalid_timezone_is_rejected_at_creation() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(
        home.path(),
        &["study", "create", "Bad study", "--timezone", "Not/AZone"],
    );
    assert_ne!(code, 0);
    assert!(stderr.contains("timezone"));
}

#[test]
fn deleted_survey_reconcile_reports_purge() {
    let home = tempfile::tempdir().unwrap();
    let home = home.path();

    let study = run_cli_success(home, &["study", "create", "Pilot", "--timezone", "UTC"]);
    let study_id = json_field(&study, "id");
    let survey = run_cli_success(home, &["survey", "create", &study_id, "s"]);
    let survey_id = json_field(&survey, "id");

    run_cli_success(home, &["survey", "delete", &survey_id]);
    let outcome = run_cli_success(home, &["reconcile", "survey", &survey_id]);
    let outcome: serde_json::Value = serde_json::from_str(&outcome).unwrap();
    assert!(outcome["purged"].as_bool().unwrap());
}
