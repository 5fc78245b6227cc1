//! Binary-level tests for the sqlrag CLI.

use std::path::Path;
use std::process::Command;

use super::common::{local_config_toml, SEED_SQL};

/// Runs the sqlrag binary with the given arguments.
/// Returns (exit code, stdout, stderr).
fn run_sqlrag(args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_sqlrag"))
        .args(args)
        .env("RUST_LOG", "info")
        .env_remove("AWS_REGION")
        .env_remove("AWS_DEFAULT_REGION")
        .output()
        .expect("Failed to execute sqlrag");

    let exit_code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    (exit_code, stdout, stderr)
}

/// Writes a config file and seed script into `dir`, returning their paths.
fn write_fixtures(dir: &Path) -> (String, String) {
    let db_path = dir.join("shop.db");
    let config_path = dir.join("config.toml");
    let seed_path = dir.join("seed.sql");

    std::fs::write(&config_path, local_config_toml(&db_path.to_string_lossy())).unwrap();
    std::fs::write(&seed_path, SEED_SQL).unwrap();

    (
        config_path.to_string_lossy().to_string(),
        seed_path.to_string_lossy().to_string(),
    )
}

#[test]
fn test_text_output_with_local_warehouse() {
    let dir = tempfile::tempdir().unwrap();
    let (config, seed) = write_fixtures(dir.path());

    let (code, stdout, stderr) = run_sqlrag(&[
        "--config",
        &config,
        "--seed",
        &seed,
        "--run-id",
        "cli-text",
        "Count all orders",
    ]);

    assert_eq!(code, 0, "stderr: {stderr}");
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "[3]");
    assert!(lines[1].starts_with("executionID: local-"));
    assert_eq!(lines[2], "queryState: SUCCEEDED");
    assert_eq!(
        lines[3],
        "sqlQuery: SELECT COUNT(*) AS total_orders FROM orders;"
    );
    assert!(stderr.contains("cli-text"));
}

#[test]
fn test_json_output_has_two_documents() {
    let dir = tempfile::tempdir().unwrap();
    let (config, seed) = write_fixtures(dir.path());

    let (code, stdout, stderr) = run_sqlrag(&[
        "--config",
        &config,
        "--seed",
        &seed,
        "--format",
        "json",
        "List the orders",
    ]);

    assert_eq!(code, 0, "stderr: {stderr}");
    let documents: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let documents = documents.as_array().unwrap();
    assert_eq!(documents.len(), 2);
    assert_eq!(
        documents[0]["page_content"],
        "[o1, 100.0][o2, 250.0][o3, 75.5]"
    );
    assert_eq!(documents[1]["page_content"], "");
    assert_eq!(documents[1]["metadata"]["queryState"], "SUCCEEDED");
}

#[test]
fn test_failed_query_exits_zero_with_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    let (config, _) = write_fixtures(dir.path());

    // No seed: the orders table does not exist, so the query fails.
    let (code, stdout, stderr) = run_sqlrag(&["--config", &config, "Count all orders"]);

    assert_eq!(code, 0, "stderr: {stderr}");
    assert_eq!(stdout.lines().next(), Some("NA"));
    assert!(stdout.contains("queryState: FAILED"));
}

#[test]
fn test_athena_without_database_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing_config = dir.path().join("absent.toml");

    let (code, stdout, stderr) = run_sqlrag(&[
        "--config",
        &missing_config.to_string_lossy(),
        "--llm",
        "mock",
        "--warehouse",
        "athena",
        "--region",
        "us-east-1",
        "Count all orders",
    ]);

    assert_eq!(code, 1);
    assert!(stdout.is_empty());
    assert!(stderr.contains("Configuration Error"), "stderr: {stderr}");
}

#[test]
fn test_seed_requires_local_warehouse() {
    let dir = tempfile::tempdir().unwrap();
    let (config, seed) = write_fixtures(dir.path());

    let (code, _, stderr) = run_sqlrag(&[
        "--config",
        &config,
        "--warehouse",
        "athena",
        "--database",
        "shop",
        "--output-location",
        "s3://results/",
        "--endpoint-url",
        "http://localhost:4566",
        "--seed",
        &seed,
        "Count all orders",
    ]);

    assert_eq!(code, 1);
    assert!(stderr.contains("--seed"), "stderr: {stderr}");
}
