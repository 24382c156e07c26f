//! CLI functionality for the qme tool
//!
//! This module contains all CLI-related functionality including:
//! - Measure evaluation
//! - Catalog listing
//! - Compile-only checks
//! - Parameter parsing, logging setup and output formatting

pub mod catalog;
pub mod check;
pub mod evaluate;
pub mod logging;
pub mod output;
pub mod params;

use anyhow::{Context, Result};
use octofhir_qme_model::{InMemoryMeasureRepository, MeasureLoader};
use std::path::Path;
use tracing::debug;

/// Load every measure under `path` into a fresh repository
pub fn load_repository(path: &Path) -> Result<InMemoryMeasureRepository> {
    let measures = MeasureLoader::new()
        .load(path)
        .with_context(|| format!("Failed to load measures from {}", path.display()))?;
    debug!(count = measures.len(), path = %path.display(), "loaded measures");

    InMemoryMeasureRepository::from_definitions(measures)
        .with_context(|| format!("Invalid measures in {}", path.display()))
}
