//! Loader tests against temporary directories

use octofhir_qme_model::{InMemoryCorpus, LoadError, MeasureLoader, RecordCorpus};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(path: &Path, value: serde_json::Value) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
}

fn measure(id: &str, sub_id: Option<&str>) -> serde_json::Value {
    let mut value = json!({
        "id": id,
        "name": format!("Measure {}", id),
        "logic": {"population": "age >= 18", "numerator": "has_diagnosis_x"}
    });
    if let Some(sub_id) = sub_id {
        value["sub_id"] = json!(sub_id);
        value["subtitle"] = json!(sub_id.to_uppercase());
    }
    value
}

#[test]
fn loads_single_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("m1.json");
    write(&path, measure("M1", None));

    let measures = MeasureLoader::new().load_measure(&path).unwrap();
    assert_eq!(measures.len(), 1);
    assert_eq!(measures[0].id, "M1");
}

#[test]
fn loads_collection_and_directory_in_name_order() {
    let dir = TempDir::new().unwrap();
    write(
        &dir.path().join("b.json"),
        json!([measure("M2", Some("a")), measure("M2", Some("b"))]),
    );
    write(&dir.path().join("a.json"), measure("M1", None));
    write(&dir.path().join("nested/c.json"), measure("M3", None));
    fs::write(dir.path().join("README.md"), "not a measure").unwrap();

    let measures = MeasureLoader::new().load_measure(dir.path()).unwrap();
    let keys: Vec<String> = measures.iter().map(|m| m.key().to_string()).collect();
    assert_eq!(keys, vec!["M1", "M2/a", "M2/b", "M3"]);
}

#[test]
fn rejects_duplicate_keys() {
    let dir = TempDir::new().unwrap();
    write(&dir.path().join("a.json"), measure("M1", Some("a")));
    write(&dir.path().join("b.json"), measure("M1", Some("a")));

    let err = MeasureLoader::new().load_measure(dir.path()).unwrap_err();
    assert!(matches!(err, LoadError::Duplicate { ref key, .. } if key == "M1/a"));
}

#[test]
fn rejects_invalid_definition_with_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.json");
    let mut value = measure("M1", None);
    value["name"] = json!("  ");
    write(&path, value);

    let err = MeasureLoader::new().load_measure(&path).unwrap_err();
    assert!(matches!(err, LoadError::Invalid { .. }));
    assert!(err.to_string().contains("bad.json"));
}

#[test]
fn rejects_missing_numerator() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("m.json");
    write(
        &path,
        json!({"id": "M1", "name": "x", "logic": {"population": "true"}}),
    );

    let err = MeasureLoader::new().load_measure(&path).unwrap_err();
    assert!(matches!(err, LoadError::Json { .. }));
}

#[test]
fn missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = MeasureLoader::new()
        .load_measure(dir.path().join("nope.json"))
        .unwrap_err();
    assert!(matches!(err, LoadError::Io { .. }));
}

#[test]
fn loads_bundle_and_tags_measures() {
    let dir = TempDir::new().unwrap();
    write(
        &dir.path().join("bundle.json"),
        json!({"id": "hedis-2024", "name": "HEDIS", "version": "2024.1"}),
    );
    write(&dir.path().join("measures/m1.json"), measure("M1", None));
    write(&dir.path().join("measures/m2.json"), measure("M2", None));

    let loader = MeasureLoader::new();
    let bundle = loader.load_bundle(dir.path()).unwrap();
    assert_eq!(bundle.metadata.id, "hedis-2024");
    assert_eq!(bundle.metadata.version, "2024.1");
    assert_eq!(bundle.measures.len(), 2);
    assert!(
        bundle
            .measures
            .iter()
            .all(|m| m.bundle.as_deref() == Some("hedis-2024"))
    );

    // `load` detects the bundle layout on its own
    assert_eq!(loader.load(dir.path()).unwrap().len(), 2);
}

#[test]
fn corpus_from_json_lines_keeps_bad_lines_as_faults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.jsonl");
    fs::write(&path, "{\"id\": \"p1\"}\n\nnot json\n{\"patient_id\": 2}\n").unwrap();

    let corpus = InMemoryCorpus::from_path(&path).unwrap();
    assert_eq!(corpus.len(), 3);

    let items = futures::executor::block_on(async {
        use futures::StreamExt;
        corpus.stream().collect::<Vec<_>>().await
    });
    assert!(items[0].is_ok());
    assert!(items[1].as_ref().is_err_and(|e| e.is_per_record()));
    assert_eq!(items[2].as_ref().unwrap().id().as_str(), "2");
}

#[test]
fn corpus_from_json_array() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.json");
    write(&path, json!([{"id": "p1"}, {"id": "p2"}]));

    let corpus = InMemoryCorpus::from_path(&path).unwrap();
    assert_eq!(corpus.size_hint(), Some(2));
}
