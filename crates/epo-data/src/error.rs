//! Error types for data operations.

use thiserror::Error;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur while coercing input into a returns matrix.
#[derive(Debug, Error)]
pub enum DataError {
    /// Input is not a recognized tabular or array shape
    #[error("Invalid input kind: {0}")]
    InvalidInputKind(String),

    /// A cell is empty or null
    #[error("Missing value in column '{column}' at row {row}")]
    MissingValue {
        /// Column (asset) name
        column: String,
        /// Row (observation) index
        row: usize,
    },

    /// Data parsing error
    #[error("Data parsing error: {0}")]
    Parse(String),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
