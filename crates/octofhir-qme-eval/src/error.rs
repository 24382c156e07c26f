//! Compilation, evaluation and execution errors

use octofhir_qme_logic::{ParameterType, ParseError};
use octofhir_qme_model::{CorpusError, RepositoryError};
use octofhir_qme_types::{Category, RecordId, ValueError};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// The measure logic could not be bound into a classifier.
///
/// Raised before any record is processed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// Textual criterion failed to parse
    #[error("Invalid {category} criterion: {source}")]
    Parse {
        category: Category,
        source: ParseError,
    },

    /// Required parameter not supplied and without default
    #[error("Missing required parameter: {name}")]
    MissingParameter { name: String },

    /// Supplied value cannot be coerced to the declared type
    #[error("Parameter {name} expects {expected}, found {found}")]
    ParameterType {
        name: String,
        expected: ParameterType,
        found: String,
    },

    /// Criterion references a parameter the measure does not declare
    #[error("Undeclared parameter ${name} in {category} criterion")]
    UndeclaredParameter { category: Category, name: String },

    /// A criterion references its own category or one evaluated after it
    #[error("The {category} criterion cannot reference {referenced}")]
    CategoryReference {
        category: Category,
        referenced: Category,
    },

    #[error("Invalid regular expression '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },
}

impl CompileError {
    pub fn missing_parameter(name: impl Into<String>) -> Self {
        Self::MissingParameter { name: name.into() }
    }

    pub fn parameter_type(
        name: impl Into<String>,
        expected: ParameterType,
        found: impl Into<String>,
    ) -> Self {
        Self::ParameterType {
            name: name.into(),
            expected,
            found: found.into(),
        }
    }

    pub fn undeclared_parameter(category: Category, name: impl Into<String>) -> Self {
        Self::UndeclaredParameter {
            category,
            name: name.into(),
        }
    }
}

/// Failure while evaluating a criterion against one record
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error(transparent)]
    Value(#[from] ValueError),

    /// Operand of the wrong type for an operator
    #[error("{operator} expects {expected}, found {found}")]
    TypeMismatch {
        operator: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

impl EvalError {
    pub fn type_mismatch(operator: &'static str, expected: &'static str, found: &'static str) -> Self {
        Self::TypeMismatch {
            operator,
            expected,
            found,
        }
    }
}

/// A record that could not be classified.
///
/// The record contributes nothing to the classification; the run continues.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct RecordFault {
    /// Unknown when the record could not even be identified
    pub record: Option<RecordId>,
    pub message: String,
}

impl RecordFault {
    pub fn new(record: Option<RecordId>, message: impl Into<String>) -> Self {
        Self {
            record,
            message: message.into(),
        }
    }

    pub fn for_record(record: &RecordId, error: impl fmt::Display) -> Self {
        Self::new(Some(record.clone()), error.to_string())
    }

    /// Per-record corpus failure, keeping the identifier when the corpus knew it
    pub fn from_corpus(error: &CorpusError) -> Self {
        let record = match error {
            CorpusError::MalformedRecord { record, .. } => record.clone().map(RecordId::new),
            CorpusError::Unavailable { .. } => None,
        };
        Self::new(record, error.to_string())
    }
}

impl fmt::Display for RecordFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.record {
            Some(record) => write!(f, "record {}: {}", record, self.message),
            None => write!(f, "unidentified record: {}", self.message),
        }
    }
}

impl std::error::Error for RecordFault {}

/// Aggregation run aborted; no partial classification is returned
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Caller cancellation or deadline
    #[error("Evaluation cancelled")]
    Cancelled,

    /// The corpus stream itself failed
    #[error(transparent)]
    Corpus(CorpusError),

    /// A worker task panicked or was aborted
    #[error("Worker failed: {message}")]
    Worker { message: String },
}

/// Errors returned by `evaluate`
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Measure not found: {}", describe(.id, .sub_id.as_deref()))]
    NotFound { id: String, sub_id: Option<String> },

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("Evaluation cancelled")]
    Cancelled,

    #[error(transparent)]
    Corpus(CorpusError),

    #[error("Worker failed: {message}")]
    Worker { message: String },

    /// Repository failure other than a missing measure
    #[error(transparent)]
    Repository(RepositoryError),
}

impl ExecutionError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<RepositoryError> for ExecutionError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound { id, sub_id } => Self::NotFound { id, sub_id },
            other => Self::Repository(other),
        }
    }
}

impl From<EngineError> for ExecutionError {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::Cancelled => Self::Cancelled,
            EngineError::Corpus(e) => Self::Corpus(e),
            EngineError::Worker { message } => Self::Worker { message },
        }
    }
}

fn describe(id: &str, sub_id: Option<&str>) -> String {
    match sub_id {
        Some(sub_id) => format!("{}/{}", id, sub_id),
        None => id.to_string(),
    }
}
