//! Check command implementation

use super::{load_repository, output, params::parse_parameters};
use anyhow::{Context, Result};
use octofhir_qme_eval::MeasureExecutor;
use octofhir_qme_model::InMemoryCorpus;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for check command
pub struct CheckConfig {
    pub measures: PathBuf,
    pub measure_id: String,
    pub sub_id: Option<String>,
    pub params: Vec<String>,
    pub verbose: bool,
}

/// Compile a measure with the given parameters without evaluating it
pub async fn check(config: CheckConfig) -> Result<()> {
    let repository = load_repository(&config.measures)?;
    let params = parse_parameters(&config.params)?;

    let executor = MeasureExecutor::new(Arc::new(repository), Arc::new(InMemoryCorpus::new()));
    let (definition, classifier) = executor
        .compile(&config.measure_id, config.sub_id.as_deref(), &params)
        .await
        .with_context(|| format!("Failed to compile measure {}", config.measure_id))?;

    if config.verbose {
        eprintln!("Name: {}", definition.name);
        eprintln!("Exclusion scope: {:?}", classifier.exclusion_scope());
    }

    println!(
        "{}",
        output::format_success(&format!("{} compiles", definition.key()))
    );
    Ok(())
}
