//! Parallel aggregation of per-record classifications
//!
//! The engine reads the corpus stream, cuts it into shards and classifies
//! every shard on a blocking worker. Shard partials are folded with the
//! merger once all workers have finished. Because the merge is a
//! commutative monoid, neither the shard size nor the order in which
//! workers complete can change the result.

use crate::cancel::CancellationToken;
use crate::classifier::Classify;
use crate::config::EngineConfig;
use crate::error::{EngineError, RecordFault};
use crate::merge::Merge;
use futures::StreamExt;
use octofhir_qme_model::{PatientRecord, RecordCorpus};
use octofhir_qme_types::Classification;
use std::mem;
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

/// Outcome of a complete run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregate {
    pub classification: Classification,
    /// Records that could not be classified, sorted
    pub faults: Vec<RecordFault>,
    /// Stream items consumed, malformed ones included
    pub records_seen: usize,
    pub shards: usize,
}

/// Result of classifying one shard
#[derive(Debug)]
struct ShardOutput {
    partial: Classification,
    faults: Vec<RecordFault>,
}

type ShardResult = Result<ShardOutput, EngineError>;

/// Applies a classifier across a record corpus
#[derive(Debug, Clone, Default)]
pub struct AggregationEngine {
    config: EngineConfig,
}

impl AggregationEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Classify every record of `corpus` on the blocking pool.
    ///
    /// Returns [`EngineError::Cancelled`] once `cancel` fires or the
    /// configured timeout elapses; no partial result is returned then.
    pub async fn run<C, M>(
        &self,
        classifier: Arc<C>,
        merger: Arc<M>,
        corpus: &dyn RecordCorpus,
        cancel: &CancellationToken,
    ) -> Result<Aggregate, EngineError>
    where
        C: Classify + ?Sized + 'static,
        M: Merge + 'static,
    {
        let token = self.run_token(cancel);
        let mut run = Run {
            classifier,
            merger: Arc::clone(&merger),
            token: token.clone(),
            tasks: JoinSet::new(),
            workers: self.config.effective_workers(),
            partials: Vec::new(),
            faults: Vec::new(),
            records_seen: 0,
            shards: 0,
        };

        if let Err(error) = run.consume(corpus, self.config.effective_shard_size()).await {
            // stop in-flight shards at their next record boundary
            token.cancel();
            run.tasks.abort_all();
            match &error {
                EngineError::Cancelled => info!(records = run.records_seen, "aggregation cancelled"),
                other => warn!(error = %other, "aggregation aborted"),
            }
            return Err(error);
        }

        let Run {
            partials,
            mut faults,
            records_seen,
            shards,
            ..
        } = run;
        let classification = merger.fold(partials);
        faults.sort();

        info!(
            records = records_seen,
            shards,
            faults = faults.len(),
            "aggregation finished"
        );
        Ok(Aggregate {
            classification,
            faults,
            records_seen,
            shards,
        })
    }

    /// Classify on the calling task, one record at a time.
    ///
    /// Yields the same classification and faults as [`run`](Self::run).
    pub async fn run_sequential<C, M>(
        &self,
        classifier: &C,
        merger: &M,
        corpus: &dyn RecordCorpus,
        cancel: &CancellationToken,
    ) -> Result<Aggregate, EngineError>
    where
        C: Classify + ?Sized,
        M: Merge,
    {
        let token = self.run_token(cancel);
        let mut stream = corpus.stream();
        let mut classification = merger.identity();
        let mut faults = Vec::new();
        let mut records_seen = 0;

        loop {
            let item = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(EngineError::Cancelled),
                item = stream.next() => item,
            };
            let Some(item) = item else { break };
            if token.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            records_seen += 1;
            match item {
                Ok(record) => match classifier.classify(&record) {
                    Ok(partial) => classification = merger.merge(classification, partial),
                    Err(fault) => {
                        warn!(%fault, "record fault");
                        faults.push(fault);
                    }
                },
                Err(error) if error.is_per_record() => {
                    warn!(%error, "skipping malformed record");
                    faults.push(RecordFault::from_corpus(&error));
                }
                Err(error) => return Err(EngineError::Corpus(error)),
            }
        }
        if token.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        faults.sort();
        Ok(Aggregate {
            classification,
            faults,
            records_seen,
            shards: usize::from(records_seen > 0),
        })
    }

    fn run_token(&self, cancel: &CancellationToken) -> CancellationToken {
        let token = cancel.child();
        match self.config.timeout {
            Some(timeout) => token.deadline_in(timeout),
            None => token,
        }
    }
}

/// State of one parallel run
struct Run<C: ?Sized, M> {
    classifier: Arc<C>,
    merger: Arc<M>,
    token: CancellationToken,
    tasks: JoinSet<ShardResult>,
    workers: usize,
    partials: Vec<Classification>,
    faults: Vec<RecordFault>,
    records_seen: usize,
    shards: usize,
}

impl<C, M> Run<C, M>
where
    C: Classify + ?Sized + 'static,
    M: Merge + 'static,
{
    async fn consume(&mut self, corpus: &dyn RecordCorpus, shard_size: usize) -> Result<(), EngineError> {
        let mut stream = corpus.stream();
        let mut shard = Vec::with_capacity(shard_size);

        loop {
            let item = tokio::select! {
                biased;
                _ = self.token.cancelled() => return Err(EngineError::Cancelled),
                item = stream.next() => item,
            };
            let Some(item) = item else { break };
            if self.token.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            self.records_seen += 1;
            match item {
                Ok(record) => shard.push(record),
                Err(error) if error.is_per_record() => {
                    warn!(%error, "skipping malformed record");
                    self.faults.push(RecordFault::from_corpus(&error));
                }
                Err(error) => return Err(EngineError::Corpus(error)),
            }

            if shard.len() >= shard_size {
                let full = mem::replace(&mut shard, Vec::with_capacity(shard_size));
                self.dispatch(full).await?;
            }
        }
        if !shard.is_empty() {
            self.dispatch(shard).await?;
        }

        while let Some(joined) = self.join_next().await? {
            self.absorb(joined)?;
        }
        if self.token.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        Ok(())
    }

    async fn dispatch(&mut self, records: Vec<PatientRecord>) -> Result<(), EngineError> {
        while self.tasks.len() >= self.workers {
            match self.join_next().await? {
                Some(joined) => self.absorb(joined)?,
                None => break,
            }
        }
        if self.token.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let index = self.shards;
        self.shards += 1;
        debug!(shard = index, records = records.len(), "dispatching shard");

        let classifier = Arc::clone(&self.classifier);
        let merger = Arc::clone(&self.merger);
        let token = self.token.clone();
        self.tasks
            .spawn_blocking(move || classify_shard(&*classifier, &*merger, &records, &token));
        Ok(())
    }

    /// Wait for the next shard, giving up as soon as the run is cancelled
    async fn join_next(&mut self) -> Result<Option<Result<ShardResult, JoinError>>, EngineError> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(EngineError::Cancelled),
            joined = self.tasks.join_next() => Ok(joined),
        }
    }

    fn absorb(&mut self, joined: Result<ShardResult, JoinError>) -> Result<(), EngineError> {
        let output = joined.map_err(|e| EngineError::Worker {
            message: e.to_string(),
        })??;
        self.partials.push(output.partial);
        self.faults.extend(output.faults);
        Ok(())
    }
}

/// Classify one shard and fold it locally
fn classify_shard<C, M>(
    classifier: &C,
    merger: &M,
    records: &[PatientRecord],
    token: &CancellationToken,
) -> ShardResult
where
    C: Classify + ?Sized,
    M: Merge,
{
    let mut partial = merger.identity();
    let mut faults = Vec::new();

    for record in records {
        if token.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        match classifier.classify(record) {
            Ok(classification) => partial = merger.merge(partial, classification),
            Err(fault) => {
                warn!(%fault, "record fault");
                faults.push(fault);
            }
        }
    }

    Ok(ShardOutput { partial, faults })
}
