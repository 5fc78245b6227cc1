//! Error types for sqlrag.
//!
//! Defines the main error enum used throughout the crate.

use thiserror::Error;

/// Main error type for retrieval operations.
#[derive(Error, Debug)]
pub enum RetrieverError {
    /// Query submission errors (malformed request, authorization, unreachable service).
    #[error("Submission error: {0}")]
    Submission(String),

    /// Status polling transport errors. Incomplete status bodies are not errors.
    #[error("Status error: {0}")]
    Status(String),

    /// Result fetch errors.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// SQL generation errors (LLM API failures, empty or unexpected completions).
    #[error("Generation error: {0}")]
    Generation(String),

    /// Configuration errors (invalid config file, missing required settings, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal errors (poisoned locks, failed background tasks, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RetrieverError {
    /// Creates a submission error with the given message.
    pub fn submission(msg: impl Into<String>) -> Self {
        Self::Submission(msg.into())
    }

    /// Creates a status error with the given message.
    pub fn status(msg: impl Into<String>) -> Self {
        Self::Status(msg.into())
    }

    /// Creates a fetch error with the given message.
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    /// Creates a generation error with the given message.
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Submission(_) => "Submission Error",
            Self::Status(_) => "Status Error",
            Self::Fetch(_) => "Fetch Error",
            Self::Generation(_) => "Generation Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using RetrieverError.
pub type Result<T> = std::result::Result<T, RetrieverError>;
