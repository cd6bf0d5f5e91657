//! CLI integration tests
//!
//! Each test writes a program model JSON to a temp directory and runs the
//! binary against it.

use assert_cmd::Command;
use predicates::prelude::*;
use refgraph::model::{ModelBuilder, ProgramModel};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_model(dir: &Path, model: &ProgramModel) -> PathBuf {
    let path = dir.join("model.json");
    let json = serde_json::to_string_pretty(model).unwrap();
    std::fs::write(&path, json).unwrap();
    path
}

/// A model with one entry point and one unused method.
fn model_with_dead_code() -> ProgramModel {
    let mut mb = ModelBuilder::new();
    let mut app = mb.class("com.example.App");
    app.method("main")
        .static_method()
        .param("java.lang.String[]")
        .done();
    app.method("stale").done();
    mb.finish()
}

/// A model where everything is reachable from main.
fn clean_model() -> ProgramModel {
    use refgraph::model::{BodyOp, DeclRef};

    let mut mb = ModelBuilder::new();
    let mut app = mb.class("com.example.App");
    let work = app.method("work").body(vec![]).done();
    app.method("main")
        .static_method()
        .param("java.lang.String[]")
        .body(vec![BodyOp::Call {
            target: DeclRef::Declared(work),
            args: vec![],
            on_subclass: false,
            result_used: false,
        }])
        .done();
    mb.finish()
}

fn refgraph() -> Command {
    Command::cargo_bin("refgraph").unwrap()
}

#[test]
fn test_cli_help() {
    refgraph()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("refgraph"))
        .stdout(predicate::str::contains("--parallel"))
        .stdout(predicate::str::contains("--baseline"));
}

#[test]
fn test_cli_version() {
    refgraph()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("refgraph"));
}

#[test]
fn test_cli_reports_unused_method() {
    let temp = TempDir::new().unwrap();
    let model_path = write_model(temp.path(), &model_with_dead_code());

    refgraph()
        .arg(&model_path)
        .arg("--quiet")
        .assert()
        .success()
        .stdout(predicate::str::contains("stale"))
        .stdout(predicate::str::contains("RG001"));
}

#[test]
fn test_cli_clean_model_reports_nothing() {
    let temp = TempDir::new().unwrap();
    let model_path = write_model(temp.path(), &clean_model());

    refgraph()
        .arg(&model_path)
        .arg("--quiet")
        .assert()
        .success()
        .stdout(predicate::str::contains("No issues found!"));
}

#[test]
fn test_cli_parallel_matches_default() {
    let temp = TempDir::new().unwrap();
    let model_path = write_model(temp.path(), &model_with_dead_code());

    refgraph()
        .arg(&model_path)
        .arg("--quiet")
        .arg("--parallel")
        .assert()
        .success()
        .stdout(predicate::str::contains("RG001"));
}

#[test]
fn test_cli_json_output_to_file() {
    let temp = TempDir::new().unwrap();
    let model_path = write_model(temp.path(), &model_with_dead_code());
    let out_path = temp.path().join("report.json");

    refgraph()
        .arg(&model_path)
        .arg("--quiet")
        .arg("--format")
        .arg("json")
        .arg("--output")
        .arg(&out_path)
        .assert()
        .success();

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out_path).unwrap()).unwrap();
    assert_eq!(report["total_issues"], 1);
    assert_eq!(report["issues"][0]["code"], "RG001");
}

#[test]
fn test_cli_retain_pattern_suppresses() {
    let temp = TempDir::new().unwrap();
    let model_path = write_model(temp.path(), &model_with_dead_code());

    refgraph()
        .arg(&model_path)
        .arg("--quiet")
        .arg("--retain")
        .arg("stale")
        .assert()
        .success()
        .stdout(predicate::str::contains("No issues found!"));
}

#[test]
fn test_cli_entry_point_flag() {
    let temp = TempDir::new().unwrap();
    let model_path = write_model(temp.path(), &model_with_dead_code());

    refgraph()
        .arg(&model_path)
        .arg("--quiet")
        .arg("--entry-point")
        .arg("com.example.App void stale()")
        .assert()
        .success()
        .stdout(predicate::str::contains("No issues found!"));
}

#[test]
fn test_cli_baseline_round_trip() {
    let temp = TempDir::new().unwrap();
    let model_path = write_model(temp.path(), &model_with_dead_code());
    let baseline_path = temp.path().join("baseline.json");

    refgraph()
        .arg(&model_path)
        .arg("--quiet")
        .arg("--generate-baseline")
        .arg(&baseline_path)
        .assert()
        .success();
    assert!(baseline_path.exists());

    // With the baseline applied the known issue disappears
    refgraph()
        .arg(&model_path)
        .arg("--quiet")
        .arg("--baseline")
        .arg(&baseline_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("No issues found!"));
}

#[test]
fn test_cli_config_file() {
    let temp = TempDir::new().unwrap();
    let model_path = write_model(temp.path(), &model_with_dead_code());
    let config_path = temp.path().join("refgraph.toml");
    std::fs::write(
        &config_path,
        r#"
retain_patterns = ["stale"]

[report]
format = "terminal"
"#,
    )
    .unwrap();

    refgraph()
        .arg(&model_path)
        .arg("--quiet")
        .arg("--config")
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("No issues found!"));
}

#[test]
fn test_cli_missing_model_fails() {
    refgraph()
        .arg("/nonexistent/model.json")
        .arg("--quiet")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load model"));
}
