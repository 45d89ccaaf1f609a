//! Integration tests for the regimen binary.
//!
//! Every test points `--config` at a file inside a temp directory so that
//! nothing is read from or written to the user's real config and data dirs.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Helper to create a test directory
fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Helper to get the path to the CLI binary
fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("regimen"))
}

/// Write a config with a cycle anchor and an output dir inside `dir`
fn write_config(dir: &Path, extra: &str) -> PathBuf {
    let path = dir.join("config.toml");
    let contents = format!(
        "[run]\ncycle_anchor = \"2026-01-05\"\n{}\n[output]\ndir = {:?}\n",
        extra,
        dir.join("out")
    );
    fs::write(&path, contents).expect("Failed to write config");
    path
}

fn plan_json(config: &Path, date: &str, extra_args: &[&str]) -> serde_json::Value {
    let output = cli()
        .arg("plan")
        .arg("--config")
        .arg(config)
        .arg("--date")
        .arg(date)
        .arg("--json")
        .args(extra_args)
        .output()
        .expect("Failed to run regimen");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).expect("plan output is not JSON")
}

fn item_ids(plan: &serde_json::Value) -> Vec<String> {
    plan["items"]
        .as_array()
        .expect("items array")
        .iter()
        .map(|item| item["supplement_id"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[test]
fn test_cli_help() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Supplement regimen planner"))
        .stdout(predicate::str::contains("export-ics"));
}

#[test]
fn test_validate_default_model() {
    let temp_dir = setup_test_dir();
    let config = write_config(temp_dir.path(), "");

    cli()
        .arg("validate")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Model is valid"))
        .stdout(predicate::str::contains("Supplements: 39"));
}

#[test]
fn test_validate_rejects_broken_model() {
    let temp_dir = setup_test_dir();
    let config = write_config(temp_dir.path(), "");

    let mut model = regimen_core::build_default_model();
    model.core_set.push("unobtainium".into());
    let model_path = temp_dir.path().join("broken.json");
    regimen_core::save_model(&model, &model_path).unwrap();

    cli()
        .arg("validate")
        .arg("--config")
        .arg(&config)
        .arg("--model")
        .arg(&model_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unobtainium"));
}

#[test]
fn test_unparseable_model_file_fails() {
    let temp_dir = setup_test_dir();
    let config = write_config(temp_dir.path(), "");
    let model_path = temp_dir.path().join("model.toml");
    fs::write(&model_path, "this is = not [a model").unwrap();

    cli()
        .arg("validate")
        .arg("--config")
        .arg(&config)
        .arg("--model")
        .arg(&model_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Validation"));
}

#[test]
fn test_plan_pulse_day_json() {
    let temp_dir = setup_test_dir();
    let config = write_config(temp_dir.path(), "");

    let plan = plan_json(&config, "2026-03-08", &[]);
    assert_eq!(plan["day"], "2026-03-08");
    assert_eq!(plan["block_id"], "ANTIAGE");
    assert_eq!(plan["events"], serde_json::json!(["pulse_fisetin"]));
    assert_eq!(plan["is_pulse_day"], true);
    assert!(item_ids(&plan).contains(&"fisetin_pulse".to_string()));
}

#[test]
fn test_plan_human_readable() {
    let temp_dir = setup_test_dir();
    let config = write_config(temp_dir.path(), "");

    cli()
        .arg("plan")
        .arg("--config")
        .arg(&config)
        .arg("--date")
        .arg("2026-03-20")
        .assert()
        .success()
        .stdout(predicate::str::contains("2026-03-20  ANTI-AGE"))
        .stdout(predicate::str::contains("→"));
}

#[test]
fn test_flag_enables_optional_supplement() {
    let temp_dir = setup_test_dir();
    let config = write_config(temp_dir.path(), "");

    // April is a DETOX month
    let without = plan_json(&config, "2026-04-14", &[]);
    assert!(!item_ids(&without).contains(&"melissa".to_string()));

    let with = plan_json(&config, "2026-04-14", &["--flag", "enable_melissa"]);
    assert!(item_ids(&with).contains(&"melissa".to_string()));
}

#[test]
fn test_off_week_from_config() {
    let temp_dir = setup_test_dir();
    let config = write_config(temp_dir.path(), "off_week_start = \"2026-02-02\"");

    let plan = plan_json(&config, "2026-02-04", &[]);
    assert_eq!(plan["is_off_week"], true);
    assert!(item_ids(&plan).is_empty());

    let after = plan_json(&config, "2026-02-09", &[]);
    assert_eq!(after["is_off_week"], false);
    assert!(!item_ids(&after).is_empty());
}

#[test]
fn test_off_week_start_must_be_monday() {
    let temp_dir = setup_test_dir();
    let config = write_config(temp_dir.path(), "");

    cli()
        .arg("plan")
        .arg("--config")
        .arg(&config)
        .arg("--date")
        .arg("2026-02-04")
        .arg("--off-week-start")
        .arg("2026-02-03")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Monday"));
}

#[test]
fn test_missing_cycle_anchor_fails() {
    let temp_dir = setup_test_dir();
    let config = temp_dir.path().join("config.toml");
    fs::write(&config, "").unwrap();

    cli()
        .arg("export-csv")
        .arg("--config")
        .arg(&config)
        .arg("--year")
        .arg("2026")
        .arg("--out")
        .arg(temp_dir.path().join("plan.csv"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("cycle_anchor_date"));

    assert!(!temp_dir.path().join("plan.csv").exists());
}

#[test]
fn test_cycle_anchor_flag_overrides_config() {
    let temp_dir = setup_test_dir();
    let config = temp_dir.path().join("config.toml");
    fs::write(&config, "").unwrap();

    cli()
        .arg("plan")
        .arg("--config")
        .arg(&config)
        .arg("--year")
        .arg("2026")
        .arg("--cycle-anchor")
        .arg("2026-01-05")
        .assert()
        .success()
        .stdout(predicate::str::contains("2026-03-08"))
        .stdout(predicate::str::contains("PULSE"));
}

#[test]
fn test_export_csv_full_year() {
    let temp_dir = setup_test_dir();
    let config = write_config(temp_dir.path(), "");
    let csv_path = temp_dir.path().join("exports").join("2026.csv");

    cli()
        .arg("export-csv")
        .arg("--config")
        .arg(&config)
        .arg("--year")
        .arg("2026")
        .arg("--out")
        .arg(&csv_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Exported 365 days to CSV"));

    let contents = fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 366);
    assert_eq!(lines[0], "date,block,events,morning,any,evening");
    assert!(lines[1].starts_with("2026-01-01,NAD,"));
}

#[test]
fn test_export_csv_default_output_dir() {
    let temp_dir = setup_test_dir();
    let config = write_config(temp_dir.path(), "");

    cli()
        .arg("export-csv")
        .arg("--config")
        .arg(&config)
        .arg("--year")
        .arg("2026")
        .assert()
        .success();

    assert!(temp_dir.path().join("out").join("regimen_2026.csv").exists());
}

#[test]
fn test_export_ics_full_year() {
    let temp_dir = setup_test_dir();
    let config = write_config(temp_dir.path(), "");
    let ics_path = temp_dir.path().join("2026.ics");

    cli()
        .arg("export-ics")
        .arg("--config")
        .arg(&config)
        .arg("--year")
        .arg("2026")
        .arg("--out")
        .arg(&ics_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Exported 365 calendar events"));

    let contents = fs::read_to_string(&ics_path).unwrap();
    assert!(contents.starts_with("BEGIN:VCALENDAR\r\n"));
    assert!(contents.ends_with("END:VCALENDAR\r\n"));
    assert_eq!(contents.matches("BEGIN:VEVENT").count(), 365);
    assert!(contents.contains("DTSTART;VALUE=DATE:20261231"));
}

#[test]
fn test_digest_window() {
    let temp_dir = setup_test_dir();
    let config = write_config(temp_dir.path(), "");

    cli()
        .arg("digest")
        .arg("--config")
        .arg(&config)
        .arg("--date")
        .arg("2026-01-05")
        .arg("--days")
        .arg("3")
        .assert()
        .success()
        .stdout(predicate::str::contains("Subject: Regimen — 2026-01-05 to 2026-01-07"))
        .stdout(predicate::str::contains("DATE: 2026-01-06"))
        .stdout(predicate::str::contains("MORNING:"));
}

#[test]
fn test_digest_recipient_from_config() {
    let temp_dir = setup_test_dir();
    let config = write_config(
        temp_dir.path(),
        "[digest]\nrecipient = \"me@example.com\"",
    );

    cli()
        .arg("digest")
        .arg("--config")
        .arg(&config)
        .arg("--date")
        .arg("2026-03-08")
        .assert()
        .success()
        .stdout(predicate::str::contains("To: me@example.com"))
        .stdout(predicate::str::contains("Subject: Regimen — 2026-03-08 (ANTIAGE)"))
        .stdout(predicate::str::contains("EVENTS: pulse_fisetin"));
}
