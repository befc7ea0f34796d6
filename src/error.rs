//! Error taxonomy surfaced by the clustering core.
//!
//! Every variant is non-retryable: it means the input was malformed or the
//! selection hit a genuine edge case. Callers map these to their own
//! reporting (the CLI maps all of them to exit code 2).

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CriticalError {
    #[error("At least {required} products are required for clustering, got {found}")]
    InsufficientData { found: usize, required: usize },

    #[error("Invalid value for '{field}' in record {row}: {reason}")]
    InvalidFeature {
        row: usize,
        field: &'static str,
        reason: String,
    },

    #[error("Selected critical cluster {cluster} has no members")]
    EmptySelection { cluster: usize },
}

/// Result type for core operations.
pub type CriticalResult<T> = Result<T, CriticalError>;
