//! Domain error types
//!
//! This module defines the error hierarchy for kanon. Precondition violations
//! raised by the vocabulary are kept in their own enum so callers can match on
//! them without string inspection.

use thiserror::Error;

/// Main kanon error type
///
/// This is the primary error type used throughout the library.
#[derive(Debug, Error)]
pub enum KanonError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Vocabulary precondition violations
    #[error("Vocabulary error: {0}")]
    Vocabulary(#[from] VocabError),

    /// A parallel worker task failed; the whole run is aborted
    #[error("Worker task failed: {0}")]
    TaskFailed(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Vocabulary precondition violations
///
/// Every variant indicates a caller bug; none of them are retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VocabError {
    /// Index outside `1..next_index`
    #[error("Index {index} out of range (valid range is 1..{next_index})")]
    IndexOutOfRange { index: usize, next_index: usize },

    /// The slot was already merged into another index
    #[error("Index {0} is retired and cannot be updated")]
    Retired(usize),

    /// Reverse lookup for a value that is not live
    #[error("Value not present in vocabulary: {0}")]
    MissingValue(String),

    /// A tombstone chain loops back on itself
    #[error("Redirect cycle detected at index {0}")]
    RedirectCycle(usize),

    /// Deserialized state violates the vocabulary invariants
    #[error("Corrupt vocabulary state: {0}")]
    CorruptState(String),
}

// Conversion from std::io::Error
impl From<std::io::Error> for KanonError {
    fn from(err: std::io::Error) -> Self {
        KanonError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for KanonError {
    fn from(err: serde_json::Error) -> Self {
        KanonError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for KanonError {
    fn from(err: toml::de::Error) -> Self {
        KanonError::Configuration(format!("TOML parse error: {err}"))
    }
}
