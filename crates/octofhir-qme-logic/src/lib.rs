//! Measure criteria logic
//!
//! This crate provides:
//! - `Criterion`: the predicate tree deciding category membership for a record
//! - `MeasureLogic`: the per-category criteria and parameter declarations of a measure
//! - `parse_criterion`: the text syntax for criteria
//!
//! # Example
//!
//! ```
//! use octofhir_qme_logic::{parse_criterion, Criterion, CompareOp};
//!
//! let criterion = parse_criterion("age >= 18").unwrap();
//! assert_eq!(
//!     criterion,
//!     Criterion::compare(CompareOp::GreaterOrEqual, Criterion::field("age"), Criterion::literal(18_i64))
//! );
//! ```

pub mod criterion;
pub mod error;
pub mod logic;
pub mod parser;

pub use criterion::{CompareOp, Criterion, FieldPath};
pub use error::ParseError;
pub use logic::{CriterionSource, ExclusionScope, MeasureLogic, ParameterDecl, ParameterType};
pub use parser::parse_criterion;
