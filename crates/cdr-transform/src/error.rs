//! Error types for the transformation stages.

use thiserror::Error;

/// Errors that abort the transformation of a single domain.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TransformError {
    /// Polars DataFrame operation error.
    #[error("DataFrame error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Column not found in the frame being transformed.
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// The run was cancelled while the domain was in flight.
    #[error("transformation cancelled")]
    Cancelled,
}

/// Result type for transformation operations.
pub type Result<T> = std::result::Result<T, TransformError>;
