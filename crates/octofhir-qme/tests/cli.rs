//! CLI command tests against temporary files

#![cfg(feature = "cli")]

use octofhir_qme::cli::catalog::{CatalogConfig, catalog};
use octofhir_qme::cli::check::{CheckConfig, check};
use octofhir_qme::cli::evaluate::{EvaluateConfig, evaluate};
use octofhir_qme::cli::load_repository;
use octofhir_qme::eval::EngineConfig;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_fixtures(dir: &Path) -> (PathBuf, PathBuf) {
    let measures = dir.join("measures.json");
    fs::write(
        &measures,
        json!([
            {
                "id": "ADULT-X",
                "name": "Adults with X",
                "steward": "QA",
                "logic": {
                    "parameters": [{"name": "min_age", "type": "integer"}],
                    "population": "age >= $min_age",
                    "numerator": "has_diagnosis_x"
                }
            },
            {
                "id": "ADULT-X",
                "sub_id": "senior",
                "subtitle": "Seniors",
                "name": "Adults with X",
                "logic": {"population": "age >= 65", "numerator": "has_diagnosis_x"}
            }
        ])
        .to_string(),
    )
    .unwrap();

    let records = dir.join("records.jsonl");
    let lines = [
        json!({"id": "1", "age": 45, "has_diagnosis_x": true}),
        json!({"id": "2", "age": 70, "has_diagnosis_x": true}),
        json!({"id": "3", "age": 30}),
        json!({"id": "4", "age": 12}),
    ];
    let body: Vec<String> = lines.iter().map(Value::to_string).collect();
    fs::write(&records, body.join("\n")).unwrap();

    (measures, records)
}

fn evaluate_config(dir: &Path, sub_id: Option<&str>, params: &[&str]) -> EvaluateConfig {
    let (measures, records) = write_fixtures(dir);
    EvaluateConfig {
        measures,
        records,
        measure_id: "ADULT-X".to_string(),
        sub_id: sub_id.map(str::to_string),
        params: params.iter().map(|p| p.to_string()).collect(),
        engine: EngineConfig::new().with_shard_size(1).with_max_workers(2),
        verbose: false,
        output_format: Some("json".to_string()),
        output_file: Some(dir.join("out.json")),
    }
}

#[test]
fn test_load_repository() {
    let dir = TempDir::new().unwrap();
    let (measures, _) = write_fixtures(dir.path());

    let repository = load_repository(&measures).unwrap();
    assert_eq!(repository.len(), 2);

    let err = load_repository(&dir.path().join("missing.json")).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to load measures"));
}

#[tokio::test]
async fn test_evaluate_writes_summary() {
    let dir = TempDir::new().unwrap();
    let config = evaluate_config(dir.path(), None, &["min_age=18"]);

    evaluate(config).await.unwrap();

    let written: Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("out.json")).unwrap()).unwrap();
    assert_eq!(written["measure_id"], json!("ADULT-X"));
    assert_eq!(written["population_count"], json!(3));
    assert_eq!(written["numerator_members"], json!(["1", "2"]));
    assert_eq!(written["antinumerator_members"], json!(["3"]));
    assert!(written.get("sub_id").is_none());
}

#[tokio::test]
async fn test_evaluate_variant() {
    let dir = TempDir::new().unwrap();
    let config = evaluate_config(dir.path(), Some("senior"), &[]);

    evaluate(config).await.unwrap();

    let written: Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("out.json")).unwrap()).unwrap();
    assert_eq!(written["sub_id"], json!("senior"));
    assert_eq!(written["population_members"], json!(["2"]));
}

#[tokio::test]
async fn test_evaluate_missing_parameter_fails() {
    let dir = TempDir::new().unwrap();
    let config = evaluate_config(dir.path(), None, &[]);

    let err = evaluate(config).await.unwrap_err();
    assert!(format!("{:#}", err).contains("min_age"));
    assert!(!dir.path().join("out.json").exists());
}

#[tokio::test]
async fn test_check_and_catalog() {
    let dir = TempDir::new().unwrap();
    let (measures, _) = write_fixtures(dir.path());

    check(CheckConfig {
        measures: measures.clone(),
        measure_id: "ADULT-X".to_string(),
        sub_id: Some("senior".to_string()),
        params: Vec::new(),
        verbose: false,
    })
    .await
    .unwrap();

    let out = dir.path().join("catalog.json");
    catalog(CatalogConfig {
        measures,
        verbose: false,
        output_format: Some("json".to_string()),
        output_file: Some(out.clone()),
    })
    .await
    .unwrap();

    let written: Value = serde_json::from_str(&fs::read_to_string(out).unwrap()).unwrap();
    assert_eq!(written["ADULT-X"]["name"], json!("Adults with X"));
    assert_eq!(
        written["ADULT-X"]["variants"],
        json!([{"sub_id": "senior", "subtitle": "Seniors"}])
    );
}
