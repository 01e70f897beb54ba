use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn eoaudit_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_eoaudit"))
}

/// Run the CLI with a private home and no ambient connection settings.
fn run_cli(home: &Path, args: &[&str], envs: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(eoaudit_bin());
    cmd.args(args);
    for key in [
        "S3_ENDPOINT",
        "S3_REGION",
        "S3_ACCESS_KEY_ID",
        "S3_SECRET_ACCESS_KEY",
        "S3_BUCKET",
        "S3_KEY",
        "S3_STAC_KEY",
        "DATACUBE_DB_URL",
        "EOAUDIT_INVENTORY",
        "EOAUDIT_CONFIG",
        "RUST_LOG",
    ] {
        cmd.env_remove(key);
    }
    cmd.env("EOAUDIT_HOME", home);
    for (key, value) in envs {
        cmd.env(key, value);
    }
    cmd.output().expect("failed to execute eoaudit CLI")
}

fn parse_json_output(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json_start = stdout.find(|c| c == '{' || c == '[').unwrap_or_else(|| {
        panic!(
            "no JSON payload found in output\nstdout:\n{}\nstderr:\n{}",
            stdout,
            String::from_utf8_lossy(&output.stderr)
        )
    });
    let mut deserializer = serde_json::Deserializer::from_str(&stdout[json_start..]);
    serde_json::Value::deserialize(&mut deserializer).unwrap_or_else(|err| {
        panic!(
            "failed to parse JSON output: {}\nstdout:\n{}\nstderr:\n{}",
            err,
            stdout,
            String::from_utf8_lossy(&output.stderr)
        )
    })
}

fn scene(prefix: &str, files: &[(&str, u64)]) -> serde_json::Value {
    let contents: Vec<_> = files
        .iter()
        .map(|(name, size)| {
            serde_json::json!({
                "Key": format!("{prefix}{name}"),
                "LastModified": "03/15/2020, 08:00:01",
                "Size": size,
            })
        })
        .collect();
    serde_json::json!({
        "prefix": prefix,
        "item_count": contents.len(),
        "url": format!("https://browse/index.html?prefix={prefix}"),
        "contents": contents,
    })
}

fn write_inventory(dir: &Path, doc: serde_json::Value) -> PathBuf {
    let path = dir.join("overview.json");
    fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();
    path
}

fn clean_inventory() -> serde_json::Value {
    serde_json::json!({
        "sentinel_2": [
            scene("raw/sentinel_2/S2A_1/", &[("S2A_1_B04.tif", 5000), ("datacube-metadata.yaml", 300)]),
            scene("raw/sentinel_2/S2A_2/", &[("S2A_2_B04.tif", 7000), ("datacube-metadata.yaml", 310)]),
        ],
        "modis": []
    })
}

fn dirty_inventory() -> serde_json::Value {
    serde_json::json!({
        "sentinel_2": [
            scene("raw/sentinel_2/S2A_1/", &[("S2A_1_B04.tif", 5000), ("datacube-metadata.yaml", 300)]),
            scene("raw/sentinel_2/S2A_2/", &[("S2A_2_B04.tif", 0), ("log_file.txt", 12)]),
        ]
    })
}

#[test]
fn test_check_without_inventory_explains_how_to_build() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("nowhere.json");
    let output = run_cli(
        temp.path(),
        &["check", "--skip-live", "--inventory", missing.to_str().unwrap()],
        &[],
    );

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: Inventory not found"), "stderr:\n{}", stderr);
    assert!(stderr.contains("eoaudit build"), "stderr:\n{}", stderr);
}

#[test]
fn test_check_without_inventory_json_error() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("nowhere.json");
    let output = run_cli(
        temp.path(),
        &["check", "--skip-live", "--json"],
        &[("EOAUDIT_INVENTORY", missing.to_str().unwrap())],
    );

    assert_eq!(output.status.code(), Some(1));
    let payload = parse_json_output(&output);
    assert!(payload["error"].as_str().unwrap().contains("Inventory not found"));
}

#[test]
fn test_clean_inventory_exits_zero() {
    let temp = TempDir::new().unwrap();
    let path = write_inventory(temp.path(), clean_inventory());
    let output = run_cli(
        temp.path(),
        &["check", "--skip-live", "--json", "--inventory", path.to_str().unwrap()],
        &[],
    );

    assert_eq!(
        output.status.code(),
        Some(0),
        "stdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    let report = parse_json_output(&output);
    assert_eq!(report["discrepancies"], 0);
    assert_eq!(report["outcomes"].as_array().unwrap().len(), 8);
}

#[test]
fn test_discrepancies_exit_two() {
    let temp = TempDir::new().unwrap();
    let path = write_inventory(temp.path(), dirty_inventory());
    let output = run_cli(
        temp.path(),
        &["check", "--skip-live", "--json", "--inventory", path.to_str().unwrap()],
        &[],
    );

    assert_eq!(output.status.code(), Some(2));
    let report = parse_json_output(&output);
    let kinds: Vec<String> = report["outcomes"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|o| o["findings"].as_array().unwrap().clone())
        .map(|f| f["kind"].as_str().unwrap().to_string())
        .collect();
    assert!(kinds.contains(&"missing_metadata".to_string()));
    assert!(kinds.contains(&"log_file_found".to_string()));
    assert!(kinds.contains(&"empty_file".to_string()));
    assert!(kinds.contains(&"small_raster".to_string()));
}

#[test]
fn test_only_selected_checks_run() {
    let temp = TempDir::new().unwrap();
    let path = write_inventory(temp.path(), dirty_inventory());
    let output = run_cli(
        temp.path(),
        &[
            "check",
            "--only",
            "metadata,total-size",
            "--json",
            "--inventory",
            path.to_str().unwrap(),
        ],
        &[],
    );

    assert_eq!(output.status.code(), Some(2));
    let report = parse_json_output(&output);
    let checks: Vec<&str> = report["outcomes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["check"].as_str().unwrap())
        .collect();
    assert_eq!(checks, vec!["total-size", "metadata"]);
    assert_eq!(report["discrepancies"], 1);
}

#[test]
fn test_bad_database_url_fails_only_the_database_check() {
    let temp = TempDir::new().unwrap();
    let path = write_inventory(temp.path(), dirty_inventory());
    let output = run_cli(
        temp.path(),
        &[
            "check",
            "--only",
            "metadata,empty-file,database-count",
            "--json",
            "--inventory",
            path.to_str().unwrap(),
        ],
        &[("DATACUBE_DB_URL", "postgresql+psycopg2://cube@db/datacube")],
    );

    assert_eq!(output.status.code(), Some(1));
    let report = parse_json_output(&output);
    let outcomes = report["outcomes"].as_array().unwrap();
    let by_check = |name: &str| {
        outcomes
            .iter()
            .find(|o| o["check"] == name)
            .unwrap_or_else(|| panic!("no outcome for {name}"))
            .clone()
    };

    let database = by_check("database-count");
    assert_eq!(database["status"], "failed");
    assert!(database["error"]
        .as_str()
        .unwrap()
        .contains("datacube index could not be opened"));

    let metadata = by_check("metadata");
    assert_eq!(metadata["status"], "completed");
    assert_eq!(metadata["findings"][0]["kind"], "missing_metadata");
    let empty = by_check("empty-file");
    assert_eq!(empty["findings"][0]["kind"], "empty_file");
    assert_eq!(report["failed_checks"], 1);
}

#[test]
fn test_text_report_lists_findings() {
    let temp = TempDir::new().unwrap();
    let path = write_inventory(temp.path(), dirty_inventory());
    let output = run_cli(
        temp.path(),
        &["check", "--skip-live", "--only", "empty-file", "--inventory", path.to_str().unwrap()],
        &[],
    );

    assert_eq!(output.status.code(), Some(2));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("== empty-file =="));
    assert!(stdout.contains("empty file raw/sentinel_2/S2A_2/S2A_2_B04.tif"));
    assert!(stdout.contains("1 discrepancies"));
}

#[test]
fn test_summary_json() {
    let temp = TempDir::new().unwrap();
    let path = write_inventory(temp.path(), clean_inventory());
    let output = run_cli(
        temp.path(),
        &["summary", "--json", "--inventory", path.to_str().unwrap()],
        &[],
    );

    assert!(output.status.success());
    let rows = parse_json_output(&output);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["platform"], "modis");
    assert_eq!(rows[1]["scenes"], 2);
    assert_eq!(rows[1]["objects"], 4);
    assert_eq!(rows[1]["bytes"], 12610);
}

#[test]
fn test_config_masks_secrets() {
    let temp = TempDir::new().unwrap();
    let output = run_cli(
        temp.path(),
        &["config", "--json"],
        &[
            ("S3_SECRET_ACCESS_KEY", "top-secret"),
            ("S3_ACCESS_KEY_ID", "AKIAEXAMPLE"),
            ("S3_KEY", "raw/fiji"),
            ("DATACUBE_DB_URL", "postgres://cube:hunter2@db/datacube"),
        ],
    );

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("top-secret"));
    assert!(!stdout.contains("hunter2"));

    let config = parse_json_output(&output);
    assert_eq!(config["storage"]["raw_prefix"], "raw/fiji/");
    assert_eq!(config["storage"]["access_key_id"], "AKIAEXAMPLE");
    assert_eq!(config["storage"]["bucket"], "public-eo-data");
}

#[test]
fn test_config_file_is_read() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("audit.toml");
    fs::write(
        &config_path,
        "[storage]\nbucket = \"archive\"\n\n[conventions]\nmin_raster_size = 4096\n",
    )
    .unwrap();

    let output = run_cli(
        temp.path(),
        &["config", "--json", "--config", config_path.to_str().unwrap()],
        &[],
    );
    assert!(output.status.success());
    let config = parse_json_output(&output);
    assert_eq!(config["storage"]["bucket"], "archive");
    assert_eq!(config["conventions"]["min_raster_size"], 4096);
}

#[test]
fn test_missing_config_file_is_an_error() {
    let temp = TempDir::new().unwrap();
    let output = run_cli(
        temp.path(),
        &["config", "--config", temp.path().join("absent.toml").to_str().unwrap()],
        &[],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Config file not found"));
}
