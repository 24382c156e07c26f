//! Criteria parse errors

use thiserror::Error;

/// Errors produced while parsing criteria text
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Input was empty or whitespace only
    #[error("Empty criterion")]
    Empty,

    /// Input could not be parsed at `offset`
    #[error("Syntax error at offset {offset} in `{text}`: {message}")]
    Syntax {
        text: String,
        offset: usize,
        message: String,
    },

    /// A complete criterion was parsed but input remains
    #[error("Unexpected input at offset {offset} in `{text}`: `{rest}`")]
    Trailing {
        text: String,
        offset: usize,
        rest: String,
    },
}

impl ParseError {
    /// Create a syntax error
    pub fn syntax(text: impl Into<String>, offset: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            text: text.into(),
            offset,
            message: message.into(),
        }
    }

    /// Create a trailing input error
    pub fn trailing(text: impl Into<String>, offset: usize, rest: impl Into<String>) -> Self {
        Self::Trailing {
            text: text.into(),
            offset,
            rest: rest.into(),
        }
    }

    /// Byte offset of the error, if positional
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::Empty => None,
            Self::Syntax { offset, .. } | Self::Trailing { offset, .. } => Some(*offset),
        }
    }
}
