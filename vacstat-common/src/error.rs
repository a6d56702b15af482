//! Common error types for vacstat

use thiserror::Error;

/// Common result type for vacstat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across vacstat crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or malformed data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No vacancy records to analyze
    #[error("No data: the input contains no vacancy records")]
    EmptyInput,

    /// No exchange rate for a currency in the given year-month
    #[error("No rate for {currency} in period {period}")]
    RateNotFound { period: String, currency: String },

    /// Two partitions produced statistics for the same year
    #[error("Partitions overlap on year {0}")]
    OverlappingPartitions(i32),

    /// One or more partitions failed; the merged result would be incomplete
    #[error("{} partition(s) failed: {}", .0.len(), format_failures(.0))]
    PartitionFailures(Vec<PartitionFailure>),

    /// Internal error (task join failures and similar)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A single partition that could not be processed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionFailure {
    /// Partition label (year or file name)
    pub partition: String,
    /// Human-readable cause
    pub reason: String,
}

fn format_failures(failures: &[PartitionFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.partition, f.reason))
        .collect::<Vec<_>>()
        .join(", ")
}
