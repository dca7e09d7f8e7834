//! Crate-level error types for ragkit.
//!
//! [`RagError`] is the single taxonomy every component reports through. The
//! variants are chosen so a calling layer can tell apart the conditions it
//! must react to differently: bad input, an index that has not been built
//! yet, an unreachable backend, or a caller-initiated cancellation.

use thiserror::Error;

/// Result type used across ragkit.
pub type RagResult<T> = Result<T, RagError>;

/// ragkit error type
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RagError {
    /// Invalid name, empty query, bad options
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Unknown workspace or other named entity
    #[error("Not found: {0}")]
    NotFound(String),

    /// The snapshot for an index does not exist (index not built yet)
    #[error("Index not available at {path}: build the index first")]
    IndexUnavailable { path: String },

    /// Unrecognized document type or encrypted source
    #[error("Unsupported input {path}: {reason}")]
    UnsupportedInput { path: String, reason: String },

    /// Embedding or generation backend unreachable or erroring
    #[error("Upstream error during {operation}: {message}")]
    Upstream { operation: String, message: String },

    /// A backend call exceeded its deadline
    #[error("{operation} timed out after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },

    /// Vector length disagreement
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Build with zero usable chunks, or a query against an empty index
    #[error("Empty corpus: {0}")]
    EmptyCorpus(String),

    /// The caller cancelled the operation
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Structurally invalid snapshot, manifest or metadata file
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration loading failure
    #[cfg(feature = "config")]
    #[error("Config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Other filesystem failures
    #[error("IO error: {0}")]
    Io(String),

    /// JSON encoding failure
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RagError {
    /// Create an upstream error for the named backend operation.
    pub fn upstream(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, duration_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration_ms,
        }
    }

    pub fn unsupported(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedInput {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn index_unavailable(path: impl Into<String>) -> Self {
        Self::IndexUnavailable { path: path.into() }
    }

    /// True for both an unknown workspace and a missing snapshot.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::IndexUnavailable { .. })
    }

    /// True for transient backend failures that a retry may resolve.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::Timeout { .. })
    }

    /// Append context to the operation of a gateway failure (`Upstream` or
    /// `Timeout`).
    ///
    /// Other variants are returned unchanged.
    pub fn with_operation_context(self, context: impl std::fmt::Display) -> Self {
        match self {
            Self::Upstream { operation, message } => Self::Upstream {
                operation: format!("{operation} ({context})"),
                message,
            },
            Self::Timeout {
                operation,
                duration_ms,
            } => Self::Timeout {
                operation: format!("{operation} ({context})"),
                duration_ms,
            },
            other => other,
        }
    }
}

impl From<std::io::Error> for RagError {
    fn from(err: std::io::Error) -> Self {
        RagError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for RagError {
    fn from(err: serde_json::Error) -> Self {
        RagError::Serialization(err.to_string())
    }
}
