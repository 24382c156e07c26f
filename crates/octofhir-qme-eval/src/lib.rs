//! Quality measure evaluation
//!
//! This crate turns a measure definition into per-record classification
//! logic and applies it across a record corpus in parallel:
//!
//! - `CriteriaCompiler`: binds measure logic and parameters into a
//!   `MeasureClassifier` plus a `UnionMerger`
//! - `AggregationEngine`: shards the corpus over blocking workers and folds
//!   the partial classifications
//! - `summarize`: counts and sorted member lists per category
//! - `build_catalog`: definitions grouped by id with their sub-id variants
//! - `MeasureExecutor`: the `evaluate` and `catalog` entry points
//!
//! # Example
//!
//! ```ignore
//! use octofhir_qme_eval::MeasureExecutor;
//! use octofhir_qme_types::ParameterValues;
//!
//! let executor = MeasureExecutor::new(repository, corpus);
//! let result = executor.evaluate("0043", Some("a"), &ParameterValues::new()).await?;
//! println!("{} of {}", result.summary.numerator_count, result.summary.denominator_count);
//! ```
//!
//! # Per-record faults
//!
//! A record whose criteria cannot be evaluated (for example comparing a
//! string field with a number) is reported as a `RecordFault` and left out
//! of every category. The rest of the corpus is still classified.

pub mod cancel;
pub mod catalog;
pub mod classifier;
pub mod compile;
pub mod config;
pub mod engine;
pub mod error;
mod expr;
pub mod executor;
pub mod merge;
pub mod summary;

pub use cancel::CancellationToken;
pub use catalog::{CatalogEntry, MeasureCatalog, Variant, build_catalog};
pub use classifier::{Classify, MeasureClassifier};
pub use compile::{CriteriaCompiler, EVALUATION_ORDER};
pub use config::{DEFAULT_SHARD_SIZE, EngineConfig};
pub use engine::{Aggregate, AggregationEngine};
pub use error::{CompileError, EngineError, EvalError, ExecutionError, RecordFault};
pub use executor::{MeasureExecutor, MeasureResult};
pub use merge::{Merge, UnionMerger};
pub use summary::summarize;
