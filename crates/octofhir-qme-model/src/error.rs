//! Model, repository, corpus and loader errors

use std::path::PathBuf;
use thiserror::Error;

/// A definition or record failed structural validation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("Invalid measure definition {key}: {message}")]
    InvalidDefinition { key: String, message: String },

    #[error("Malformed patient record: {message}")]
    MalformedRecord { message: String },
}

impl ModelError {
    pub fn invalid_definition(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn malformed_record(message: impl Into<String>) -> Self {
        Self::MalformedRecord {
            message: message.into(),
        }
    }
}

/// Measure repository errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    /// No definition matches the requested id/sub-id
    #[error("Measure not found: {}", describe_key(.id, .sub_id.as_deref()))]
    NotFound { id: String, sub_id: Option<String> },

    /// A definition with the same (id, sub_id) is already stored
    #[error("Duplicate measure: {key}")]
    Duplicate { key: String },

    #[error(transparent)]
    Invalid(#[from] ModelError),

    /// Backend could not be reached
    #[error("Measure repository unavailable: {message}")]
    Unavailable { message: String },
}

impl RepositoryError {
    pub fn not_found(id: impl Into<String>, sub_id: Option<&str>) -> Self {
        Self::NotFound {
            id: id.into(),
            sub_id: sub_id.map(str::to_string),
        }
    }
}

fn describe_key(id: &str, sub_id: Option<&str>) -> String {
    match sub_id {
        Some(sub_id) => format!("{}/{}", id, sub_id),
        None => id.to_string(),
    }
}

/// Record corpus errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CorpusError {
    /// One record could not be read; the rest of the stream is usable
    #[error("Malformed record{}: {}", .record.as_ref().map(|r| format!(" {}", r)).unwrap_or_default(), .message)]
    MalformedRecord {
        record: Option<String>,
        message: String,
    },

    /// The corpus itself failed; the stream cannot be trusted
    #[error("Record corpus unavailable: {message}")]
    Unavailable { message: String },
}

impl CorpusError {
    pub fn malformed(record: Option<String>, message: impl Into<String>) -> Self {
        Self::MalformedRecord {
            record,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// True when the error concerns a single record only
    pub fn is_per_record(&self) -> bool {
        matches!(self, Self::MalformedRecord { .. })
    }
}

/// Filesystem loading errors
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {}", .path.display(), .source)]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid definition in {}: {}", .path.display(), .source)]
    Invalid { path: PathBuf, source: ModelError },

    #[error("Duplicate measure {} in {}", .key, .path.display())]
    Duplicate { path: PathBuf, key: String },
}

impl LoadError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}
