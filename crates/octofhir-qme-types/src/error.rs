//! Value-level errors

use thiserror::Error;

/// Result type for value operations
pub type ValueResult<T> = Result<T, ValueError>;

/// Errors raised by value conversion and comparison
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// Two values cannot be ordered against each other
    #[error("Cannot compare {left} with {right}")]
    Incomparable { left: String, right: String },

    /// String is not an ISO date
    #[error("Invalid date '{value}', expected YYYY-MM-DD")]
    InvalidDate { value: String },

    /// Name does not match any classification category
    #[error("Unknown category: {name}")]
    UnknownCategory { name: String },
}

impl ValueError {
    /// Create an incomparable-types error
    pub fn incomparable(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self::Incomparable {
            left: left.into(),
            right: right.into(),
        }
    }

    /// Create an invalid date error
    pub fn invalid_date(value: impl Into<String>) -> Self {
        Self::InvalidDate {
            value: value.into(),
        }
    }

    /// Create an unknown category error
    pub fn unknown_category(name: impl Into<String>) -> Self {
        Self::UnknownCategory { name: name.into() }
    }
}
