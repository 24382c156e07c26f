//! Quality measure evaluation for Rust
//!
//! This crate bundles the measure evaluation stack:
//! - Criteria logic and its text syntax
//! - Measure definitions, patient records, repositories and loaders
//! - Parallel classification of a record corpus into measure categories
//! - Summaries and the measure catalog
//!
//! # Example
//!
//! ```ignore
//! use octofhir_qme::{InMemoryCorpus, InMemoryMeasureRepository, MeasureExecutor, MeasureLoader};
//! use std::sync::Arc;
//!
//! let measures = MeasureLoader::new().load("measures/")?;
//! let repository = InMemoryMeasureRepository::from_definitions(measures)?;
//! let corpus = InMemoryCorpus::from_path("records.jsonl")?;
//!
//! let executor = MeasureExecutor::new(Arc::new(repository), Arc::new(corpus));
//! let result = executor.evaluate("0043", None, &Default::default()).await?;
//! ```

// Re-export all public APIs from internal crates
pub use octofhir_qme_eval as eval;
pub use octofhir_qme_logic as logic;
pub use octofhir_qme_model as model;
pub use octofhir_qme_types as types;

// Convenience re-exports
pub use octofhir_qme_eval::{
    CancellationToken, CompileError, EngineConfig, ExecutionError, MeasureCatalog,
    MeasureExecutor, MeasureResult,
};
pub use octofhir_qme_logic::{MeasureLogic, parse_criterion};
pub use octofhir_qme_model::{
    InMemoryCorpus, InMemoryMeasureRepository, MeasureDefinition, MeasureLoader,
};
pub use octofhir_qme_types::{ParameterValues, Summary};

// CLI module (only available with cli feature)
#[cfg(feature = "cli")]
pub mod cli;
