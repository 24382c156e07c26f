//! Evaluate and catalog through the executor

use octofhir_qme_eval::{
    CancellationToken, CompileError, EngineConfig, ExecutionError, MeasureExecutor, Variant,
};
use octofhir_qme_logic::{ExclusionScope, MeasureLogic, ParameterDecl, ParameterType};
use octofhir_qme_model::{InMemoryCorpus, InMemoryMeasureRepository, MeasureDefinition};
use octofhir_qme_types::{ParameterValues, RecordId, Summary};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn ids(values: &[&str]) -> Vec<RecordId> {
    values.iter().map(|v| RecordId::from(*v)).collect()
}

fn adult_logic() -> MeasureLogic {
    MeasureLogic::new("age >= 18", "denominator and has_diagnosis_x")
        .with_denominator("population")
        .with_exclusions("has_contraindication_y")
}

fn records() -> InMemoryCorpus {
    InMemoryCorpus::from_documents(vec![
        json!({"id": "1", "age": 45, "has_diagnosis_x": true}),
        json!({"id": "2", "age": 60, "has_diagnosis_x": true}),
        json!({"id": "3", "age": 30, "has_contraindication_y": true}),
        json!({"id": "4", "age": 12, "has_contraindication_y": true}),
    ])
}

fn executor(definitions: Vec<MeasureDefinition>, corpus: InMemoryCorpus) -> MeasureExecutor {
    let repository = InMemoryMeasureRepository::from_definitions(definitions).unwrap();
    MeasureExecutor::new(Arc::new(repository), Arc::new(corpus))
        .with_config(EngineConfig::new().with_shard_size(2).with_max_workers(2))
}

#[tokio::test]
async fn adult_diagnosis_measure() {
    let executor = executor(
        vec![MeasureDefinition::new("ADULT-X", "Adults with X", adult_logic())],
        records(),
    );

    let result = executor
        .evaluate("ADULT-X", None, &ParameterValues::new())
        .await
        .unwrap();

    let expected = Summary {
        population_count: 3,
        population_members: ids(&["1", "2", "3"]),
        denominator_count: 3,
        denominator_members: ids(&["1", "2", "3"]),
        numerator_count: 2,
        numerator_members: ids(&["1", "2"]),
        antinumerator_count: 1,
        antinumerator_members: ids(&["3"]),
        exclusions_count: 1,
        exclusions_members: ids(&["3"]),
    };
    assert_eq!(result.summary, expected);
    assert_eq!(result.measure_id, "ADULT-X");
    assert!(result.faults.is_empty());
}

#[tokio::test]
async fn exclusions_outside_population() {
    let logic = adult_logic().with_exclusion_scope(ExclusionScope::AllRecords);
    let executor = executor(vec![MeasureDefinition::new("M", "M", logic)], records());

    let summary = executor
        .evaluate("M", None, &ParameterValues::new())
        .await
        .unwrap()
        .summary;
    assert_eq!(summary.exclusions_members, ids(&["3", "4"]));
    assert!(!summary.population_members.contains(&RecordId::from("4")));
}

#[tokio::test]
async fn unknown_measure_is_not_found() {
    let executor = executor(Vec::new(), records());
    let err = executor
        .evaluate("nonexistent", None, &ParameterValues::new())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "Measure not found: nonexistent");
}

#[tokio::test]
async fn empty_corpus_counts_zero() {
    let executor = executor(
        vec![MeasureDefinition::new("M", "M", adult_logic())],
        InMemoryCorpus::new(),
    );
    let result = executor.evaluate("M", None, &ParameterValues::new()).await.unwrap();
    assert_eq!(result.summary, Summary::default());
}

#[tokio::test]
async fn variants_are_selected_by_sub_id() {
    let definitions = vec![
        MeasureDefinition::new("M1", "Split", MeasureLogic::new("age >= 18", "has_diagnosis_x"))
            .with_variant("a", "Adults"),
        MeasureDefinition::new("M1", "Split", MeasureLogic::new("age < 18", "true"))
            .with_variant("b", "Children"),
    ];
    let executor = executor(definitions, records());

    let children = executor
        .evaluate("M1", Some("b"), &ParameterValues::new())
        .await
        .unwrap();
    assert_eq!(children.sub_id.as_deref(), Some("b"));
    assert_eq!(children.summary.population_members, ids(&["4"]));

    // without a sub-id the first variant is used
    let first = executor.evaluate("M1", None, &ParameterValues::new()).await.unwrap();
    assert_eq!(first.sub_id.as_deref(), Some("a"));
}

#[tokio::test]
async fn compile_error_precedes_evaluation() {
    let logic = MeasureLogic::new("age_at(birth_date, $effective_date) >= 65", "true")
        .with_parameter(ParameterDecl::new("effective_date", ParameterType::Date));
    let executor = executor(vec![MeasureDefinition::new("M", "M", logic)], records());

    let err = executor.evaluate("M", None, &ParameterValues::new()).await.unwrap_err();
    assert_eq!(
        err,
        ExecutionError::Compile(CompileError::missing_parameter("effective_date"))
    );
}

#[tokio::test]
async fn faults_reported_with_best_effort_summary() {
    let corpus = InMemoryCorpus::from_documents(vec![
        json!({"id": "1", "age": 45, "has_diagnosis_x": true}),
        json!({"id": "2", "age": "unknown"}),
    ]);
    let executor = executor(vec![MeasureDefinition::new("M", "M", adult_logic())], corpus);

    let result = executor.evaluate("M", None, &ParameterValues::new()).await.unwrap();
    assert_eq!(result.summary.population_members, ids(&["1"]));
    assert_eq!(result.faults.len(), 1);
    assert_eq!(result.faults[0].record, Some(RecordId::from("2")));
}

#[tokio::test]
async fn cancelled_evaluation() {
    let executor = executor(vec![MeasureDefinition::new("M", "M", adult_logic())], records());
    let token = CancellationToken::new();
    token.cancel();

    let err = executor
        .evaluate_with_cancel("M", None, &ParameterValues::new(), &token)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn catalog_groups_variants() {
    let logic = || MeasureLogic::new("true", "true");
    let definitions = vec![
        MeasureDefinition::new("M1", "Measure one", logic()).with_steward("NCQA"),
        MeasureDefinition::new("M1", "Measure one", logic()).with_variant("a", "A"),
        MeasureDefinition::new("M1", "Measure one", logic()).with_variant("b", "B"),
        MeasureDefinition::new("M2", "Measure two", logic()),
    ];
    let executor = executor(definitions, InMemoryCorpus::new());

    let catalog = executor.catalog().await.unwrap();
    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog["M1"].steward, "NCQA");
    assert_eq!(
        catalog["M1"].variants,
        vec![
            Variant {
                sub_id: "a".into(),
                subtitle: "A".into()
            },
            Variant {
                sub_id: "b".into(),
                subtitle: "B".into()
            },
        ]
    );
}

#[tokio::test]
async fn result_serializes_flat_summary() {
    let executor = executor(
        vec![MeasureDefinition::new("ADULT-X", "Adults with X", adult_logic())],
        records(),
    );
    let result = executor
        .evaluate("ADULT-X", None, &ParameterValues::new())
        .await
        .unwrap();

    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["measure_id"], json!("ADULT-X"));
    assert_eq!(value["numerator_count"], json!(2));
    assert_eq!(value["numerator_members"], json!(["1", "2"]));
    assert!(value.get("faults").is_none());
    assert!(value.get("sub_id").is_none());
}
