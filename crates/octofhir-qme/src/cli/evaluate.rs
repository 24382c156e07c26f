//! Evaluate command implementation

use super::{load_repository, output, params::parse_parameters};
use anyhow::{Context, Result};
use octofhir_qme_eval::{CancellationToken, EngineConfig, MeasureExecutor};
use octofhir_qme_model::InMemoryCorpus;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Configuration for evaluate command
pub struct EvaluateConfig {
    pub measures: PathBuf,
    pub records: PathBuf,
    pub measure_id: String,
    pub sub_id: Option<String>,
    pub params: Vec<String>,
    pub engine: EngineConfig,
    pub verbose: bool,
    pub output_format: Option<String>,
    pub output_file: Option<PathBuf>,
}

/// Evaluate one measure against a record file
pub async fn evaluate(config: EvaluateConfig) -> Result<()> {
    let repository = load_repository(&config.measures)?;
    let corpus = InMemoryCorpus::from_path(&config.records)
        .with_context(|| format!("Failed to load records from {}", config.records.display()))?;

    if config.verbose {
        eprintln!(
            "Loaded {} measures and {} records",
            repository.len(),
            corpus.len()
        );
    }

    let params = parse_parameters(&config.params)?;

    if config.verbose && !params.is_empty() {
        eprintln!("Parameters:");
        for (name, value) in params.iter() {
            eprintln!("  {} = {}", name, value);
        }
    }

    let executor =
        MeasureExecutor::new(Arc::new(repository), Arc::new(corpus)).with_config(config.engine);

    // Ctrl-C cancels the run; the engine then stops between records
    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, cancelling evaluation");
                cancel.cancel();
            }
        })
    };

    let result = executor
        .evaluate_with_cancel(&config.measure_id, config.sub_id.as_deref(), &params, &cancel)
        .await;
    interrupt.abort();

    let result = result.with_context(|| match &config.sub_id {
        Some(sub_id) => format!("Failed to evaluate measure {}/{}", config.measure_id, sub_id),
        None => format!("Failed to evaluate measure {}", config.measure_id),
    })?;

    if !result.faults.is_empty() {
        warn!(faults = result.faults.len(), "records skipped");
        for fault in &result.faults {
            eprintln!("{}", output::format_warning(&fault.to_string()));
        }
    }

    let format = output::OutputFormat::parse(config.output_format.as_deref().unwrap_or("pretty"));
    let value = serde_json::to_value(&result).context("Failed to serialize result")?;
    let rendered = output::render(&value, format, || output::result_table(&result))?;

    output::write_output(&rendered, config.output_file.as_deref())
}
