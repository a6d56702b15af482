//! CLI error types

use thiserror::Error;

/// Result type for dataset, rendering and command operations
pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    /// Required column absent from the CSV header
    #[error("Missing column '{0}' in CSV header")]
    MissingColumn(String),

    /// Invalid command-line argument combination or value
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Listing filter matched no vacancy
    #[error("Nothing found")]
    NoMatches,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Pattern error: {0}")]
    Regex(#[from] regex::Error),

    #[error(transparent)]
    Common(#[from] vacstat_common::Error),

    #[error(transparent)]
    Rates(#[from] vacstat_rates::RatesError),
}

impl CliError {
    /// True when the input held no usable vacancy records
    pub fn is_empty_input(&self) -> bool {
        matches!(self, CliError::Common(vacstat_common::Error::EmptyInput))
    }

    /// Convert into a core error (partition loading reports core errors)
    pub fn into_common(self) -> vacstat_common::Error {
        match self {
            CliError::Common(e) => e,
            CliError::Io(e) => vacstat_common::Error::Io(e),
            other => vacstat_common::Error::InvalidInput(other.to_string()),
        }
    }
}
