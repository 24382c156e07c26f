//! Catalog command implementation

use super::{load_repository, output};
use anyhow::{Context, Result};
use octofhir_qme_eval::MeasureExecutor;
use octofhir_qme_model::InMemoryCorpus;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for catalog command
pub struct CatalogConfig {
    pub measures: PathBuf,
    pub verbose: bool,
    pub output_format: Option<String>,
    pub output_file: Option<PathBuf>,
}

/// List every loaded measure grouped by id
pub async fn catalog(config: CatalogConfig) -> Result<()> {
    let repository = load_repository(&config.measures)?;

    if config.verbose {
        eprintln!(
            "Loaded {} measures from {}",
            repository.len(),
            config.measures.display()
        );
    }

    let executor = MeasureExecutor::new(Arc::new(repository), Arc::new(InMemoryCorpus::new()));
    let catalog = executor.catalog().await?;

    let format = output::OutputFormat::parse(config.output_format.as_deref().unwrap_or("pretty"));
    let value = serde_json::to_value(&catalog).context("Failed to serialize catalog")?;
    let rendered = output::render(&value, format, || output::catalog_table(&catalog))?;

    output::write_output(&rendered, config.output_file.as_deref())
}
