//! Aggregation engine: shard invariance, faults and cancellation

use futures::stream::{self, StreamExt};
use octofhir_qme_eval::{
    AggregationEngine, CancellationToken, Classify, CriteriaCompiler, EngineConfig, EngineError,
    MeasureClassifier, RecordFault, UnionMerger,
};
use octofhir_qme_logic::MeasureLogic;
use octofhir_qme_model::{CorpusError, InMemoryCorpus, PatientRecord, RecordCorpus, RecordStream};
use octofhir_qme_types::{Category, Classification, ParameterValues};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn classifier() -> Arc<MeasureClassifier> {
    let logic = MeasureLogic::new("age >= 18", "denominator and has_diagnosis_x")
        .with_denominator("population")
        .with_exclusions("has_contraindication_y");
    Arc::new(
        CriteriaCompiler::new()
            .compile_logic(&logic, &ParameterValues::new())
            .unwrap(),
    )
}

fn corpus(size: usize) -> InMemoryCorpus {
    InMemoryCorpus::from_documents((0..size).map(|i| {
        json!({
            "id": format!("p{:04}", i),
            "age": (i * 7) % 90,
            "has_diagnosis_x": i % 3 == 0,
            "has_contraindication_y": i % 11 == 0,
        })
    }))
}

fn engine(shard_size: usize, workers: usize) -> AggregationEngine {
    AggregationEngine::new(
        EngineConfig::new()
            .with_shard_size(shard_size)
            .with_max_workers(workers),
    )
}

async fn run(
    engine: &AggregationEngine,
    corpus: &dyn RecordCorpus,
) -> Result<octofhir_qme_eval::Aggregate, EngineError> {
    engine
        .run(classifier(), Arc::new(UnionMerger), corpus, &CancellationToken::new())
        .await
}

#[rstest]
#[case(1, 1)]
#[case(2, 4)]
#[case(7, 3)]
#[case(64, 8)]
#[case(10_000, 2)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shard_size_does_not_change_result(#[case] shard_size: usize, #[case] workers: usize) {
    let corpus = corpus(250);
    let reference = engine(500, 1)
        .run_sequential(&*classifier(), &UnionMerger, &corpus, &CancellationToken::new())
        .await
        .unwrap();

    let aggregate = run(&engine(shard_size, workers), &corpus).await.unwrap();
    assert_eq!(aggregate.classification, reference.classification);
    assert_eq!(aggregate.records_seen, 250);
    assert_eq!(aggregate.shards, 250_usize.div_ceil(shard_size));
}

#[tokio::test]
async fn empty_corpus_yields_identity() {
    let aggregate = run(&engine(10, 2), &InMemoryCorpus::new()).await.unwrap();
    assert!(aggregate.classification.is_empty());
    assert_eq!(aggregate.shards, 0);
    assert!(aggregate.faults.is_empty());
}

#[tokio::test]
async fn faulty_records_are_reported_and_skipped() {
    let corpus = InMemoryCorpus::from_documents(vec![
        json!({"id": "a", "age": 40, "has_diagnosis_x": true}),
        json!({"id": "b", "age": "forty"}),
        json!({"age": 50}),
        json!({"id": "c", "age": 30}),
    ]);

    let aggregate = run(&engine(2, 2), &corpus).await.unwrap();
    let population: Vec<&str> = aggregate
        .classification
        .members(Category::Population)
        .iter()
        .map(|id| id.as_str())
        .collect();
    assert_eq!(population, vec!["a", "c"]);
    assert_eq!(aggregate.records_seen, 4);
    assert_eq!(aggregate.faults.len(), 2);

    // sorted: unidentified records first
    assert_eq!(aggregate.faults[0].record, None);
    assert_eq!(
        aggregate.faults[1].record.as_ref().map(|id| id.as_str()),
        Some("b")
    );
}

#[tokio::test]
async fn parallel_and_sequential_agree_on_faults() {
    let corpus = InMemoryCorpus::from_documents(vec![
        json!({"id": "x", "age": "old"}),
        json!({"id": "y", "age": 20}),
        json!({"id": "z", "age": true}),
    ]);
    let engine = engine(1, 3);
    let parallel = run(&engine, &corpus).await.unwrap();
    let sequential = engine
        .run_sequential(&*classifier(), &UnionMerger, &corpus, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(parallel.classification, sequential.classification);
    assert_eq!(parallel.faults, sequential.faults);
}

/// Corpus that fails after yielding a few records
struct BrokenCorpus {
    healthy: usize,
}

impl RecordCorpus for BrokenCorpus {
    fn stream(&self) -> RecordStream<'_> {
        let records = (0..self.healthy)
            .map(|i| Ok(PatientRecord::new(format!("r{}", i), json!({"age": 30}))));
        stream::iter(records)
            .chain(stream::once(async {
                Err(CorpusError::unavailable("connection reset"))
            }))
            .boxed()
    }
}

#[tokio::test]
async fn unavailable_corpus_aborts_run() {
    let err = run(&engine(2, 2), &BrokenCorpus { healthy: 5 }).await.unwrap_err();
    assert_eq!(err, EngineError::Corpus(CorpusError::unavailable("connection reset")));
}

#[tokio::test]
async fn pre_cancelled_token() {
    let token = CancellationToken::new();
    token.cancel();
    let err = engine(10, 2)
        .run(classifier(), Arc::new(UnionMerger), &corpus(50), &token)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::Cancelled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancellation_mid_run_returns_no_partial_result() {
    let token = CancellationToken::new();
    let seen = Arc::new(AtomicUsize::new(0));

    let cancel = token.clone();
    let counter = Arc::clone(&seen);
    let inner = classifier();
    let cancelling = move |record: &PatientRecord| -> Result<Classification, RecordFault> {
        if counter.fetch_add(1, Ordering::SeqCst) == 10 {
            cancel.cancel();
        }
        inner.classify(record)
    };

    let err = engine(5, 2)
        .run(Arc::new(cancelling), Arc::new(UnionMerger), &corpus(1_000), &token)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::Cancelled);
    assert!(seen.load(Ordering::SeqCst) < 1_000);
}

#[tokio::test]
async fn expired_timeout_cancels() {
    let engine = AggregationEngine::new(EngineConfig::new().with_timeout(Duration::ZERO));
    let err = run(&engine, &corpus(10)).await.unwrap_err();
    assert_eq!(err, EngineError::Cancelled);
}

/// Corpus that yields one record and then never produces another
struct StalledCorpus;

impl RecordCorpus for StalledCorpus {
    fn stream(&self) -> RecordStream<'_> {
        stream::once(async { Ok(PatientRecord::new("r0", json!({"age": 30}))) })
            .chain(stream::pending())
            .boxed()
    }
}

#[tokio::test]
async fn timeout_fires_while_corpus_stalls() {
    let engine = AggregationEngine::new(
        EngineConfig::new()
            .with_shard_size(10)
            .with_timeout(Duration::from_millis(50)),
    );

    let result = tokio::time::timeout(Duration::from_secs(5), run(&engine, &StalledCorpus))
        .await
        .expect("run must stop at its deadline");
    assert_eq!(result.unwrap_err(), EngineError::Cancelled);

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        engine.run_sequential(&*classifier(), &UnionMerger, &StalledCorpus, &CancellationToken::new()),
    )
    .await
    .expect("sequential run must stop at its deadline");
    assert_eq!(result.unwrap_err(), EngineError::Cancelled);
}

#[tokio::test]
async fn caller_cancel_interrupts_stalled_corpus() {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        engine(10, 2).run(classifier(), Arc::new(UnionMerger), &StalledCorpus, &token),
    )
    .await
    .expect("run must stop once the caller cancels");
    assert_eq!(result.unwrap_err(), EngineError::Cancelled);
}

#[tokio::test]
async fn caller_token_survives_internal_abort() {
    let token = CancellationToken::new();
    let result = engine(2, 2)
        .run(classifier(), Arc::new(UnionMerger), &BrokenCorpus { healthy: 3 }, &token)
        .await;
    assert!(result.is_err());
    assert!(!token.is_cancelled());
}

#[tokio::test]
async fn panicking_worker_is_reported() {
    let panicking = |_: &PatientRecord| -> Result<Classification, RecordFault> {
        panic!("classifier bug");
    };
    let err = engine(4, 1)
        .run(Arc::new(panicking), Arc::new(UnionMerger), &corpus(3), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Worker { .. }));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn any_sharding_matches_sequential(size in 0usize..120, shard_size in 1usize..40, workers in 1usize..5) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        let corpus = corpus(size);
        let (parallel, sequential) = runtime.block_on(async {
            let engine = engine(shard_size, workers);
            let parallel = run(&engine, &corpus).await.unwrap();
            let sequential = engine
                .run_sequential(&*classifier(), &UnionMerger, &corpus, &CancellationToken::new())
                .await
                .unwrap();
            (parallel, sequential)
        });
        prop_assert_eq!(parallel.classification, sequential.classification);
        prop_assert_eq!(parallel.records_seen, size);
    }
}
