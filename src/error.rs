//! Common error types for ordermetrics

use thiserror::Error;

/// Common result type for ordermetrics operations
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error taxonomy
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source file missing, unreadable or unparseable
    #[error("Load error: {0}")]
    Load(String),

    /// One or more rows violated field constraints.
    /// Carries every violating-row message so a caller sees the
    /// complete list in one pass.
    #[error("Validation failed with {} error(s)", .0.len())]
    Validation(Vec<String>),

    /// KPI computation error, downgraded to a failure envelope per KPI
    #[error("KPI error: {0}")]
    Kpi(String),
}

impl Error {
    /// Flatten to the message list the ingestion report carries.
    pub fn into_messages(self) -> Vec<String> {
        match self {
            Error::Validation(errors) => errors,
            other => vec![other.to_string()],
        }
    }
}
