//! Rate retrieval errors

use thiserror::Error;

/// Result type for rate retrieval and storage
pub type Result<T> = std::result::Result<T, RatesError>;

/// Errors from the rate feed, the rates CSV and table construction
#[derive(Debug, Error)]
pub enum RatesError {
    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// Feed returned an error response
    #[error("Feed error {0}: {1}")]
    Api(u16, String),

    /// Feed document could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Rates CSV is malformed
    #[error("Invalid rates file: {0}")]
    InvalidFile(String),

    /// CSV reading or writing failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// SQLite rate store error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from the core library (rate validation and similar)
    #[error(transparent)]
    Common(#[from] vacstat_common::Error),
}
