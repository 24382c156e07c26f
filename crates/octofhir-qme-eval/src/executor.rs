//! Public evaluate/catalog entry points

use crate::cancel::CancellationToken;
use crate::catalog::{MeasureCatalog, build_catalog};
use crate::classifier::MeasureClassifier;
use crate::compile::CriteriaCompiler;
use crate::config::EngineConfig;
use crate::engine::AggregationEngine;
use crate::error::{ExecutionError, RecordFault};
use crate::merge::UnionMerger;
use crate::summary::summarize;
use octofhir_qme_model::{MeasureDefinition, MeasureRepository, RecordCorpus};
use octofhir_qme_types::{Category, ParameterValues, Summary};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of evaluating one measure instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeasureResult {
    pub measure_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_id: Option<String>,
    #[serde(flatten)]
    pub summary: Summary,
    /// Records left out of the summary because they could not be classified
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub faults: Vec<RecordFault>,
}

/// Evaluates measures from a repository against a record corpus
pub struct MeasureExecutor {
    repository: Arc<dyn MeasureRepository>,
    corpus: Arc<dyn RecordCorpus>,
    compiler: CriteriaCompiler,
    engine: AggregationEngine,
}

impl MeasureExecutor {
    pub fn new(repository: Arc<dyn MeasureRepository>, corpus: Arc<dyn RecordCorpus>) -> Self {
        Self {
            repository,
            corpus,
            compiler: CriteriaCompiler::new(),
            engine: AggregationEngine::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.engine = AggregationEngine::new(config);
        self
    }

    pub fn engine(&self) -> &AggregationEngine {
        &self.engine
    }

    /// Look up and compile a measure without touching the corpus
    pub async fn compile(
        &self,
        measure_id: &str,
        sub_id: Option<&str>,
        params: &ParameterValues,
    ) -> Result<(Arc<MeasureDefinition>, MeasureClassifier), ExecutionError> {
        let definition = self.repository.find(measure_id, sub_id).await?;
        let (classifier, _) = self.compiler.compile(&definition, params)?;
        debug!(measure = %definition.key(), "compiled measure");
        Ok((definition, classifier))
    }

    pub async fn evaluate(
        &self,
        measure_id: &str,
        sub_id: Option<&str>,
        params: &ParameterValues,
    ) -> Result<MeasureResult, ExecutionError> {
        self.evaluate_with_cancel(measure_id, sub_id, params, &CancellationToken::new())
            .await
    }

    /// Evaluate, stopping with [`ExecutionError::Cancelled`] once `cancel` fires
    pub async fn evaluate_with_cancel(
        &self,
        measure_id: &str,
        sub_id: Option<&str>,
        params: &ParameterValues,
        cancel: &CancellationToken,
    ) -> Result<MeasureResult, ExecutionError> {
        let (definition, classifier) = self.compile(measure_id, sub_id, params).await?;
        info!(measure = %definition.key(), "evaluating measure");

        let aggregate = self
            .engine
            .run(
                Arc::new(classifier),
                Arc::new(UnionMerger),
                self.corpus.as_ref(),
                cancel,
            )
            .await?;
        let summary = summarize(&aggregate.classification);

        info!(
            measure = %definition.key(),
            population = summary.count(Category::Population),
            denominator = summary.count(Category::Denominator),
            numerator = summary.count(Category::Numerator),
            antinumerator = summary.count(Category::Antinumerator),
            exclusions = summary.count(Category::Exclusions),
            faults = aggregate.faults.len(),
            "measure evaluated"
        );

        Ok(MeasureResult {
            measure_id: definition.id.clone(),
            sub_id: definition.sub_id.clone(),
            summary,
            faults: aggregate.faults,
        })
    }

    /// Every stored measure grouped by id
    pub async fn catalog(&self) -> Result<MeasureCatalog, ExecutionError> {
        let definitions = self.repository.all().await?;
        Ok(build_catalog(definitions.iter().map(Arc::as_ref)))
    }
}
