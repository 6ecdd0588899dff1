//! Error types for the screening engine

use thiserror::Error;

/// Result type for screening operations
pub type Result<T> = std::result::Result<T, Error>;

/// Screening engine errors
///
/// Only configuration loading, the backing store and the refresh path can fail.
/// Screening itself always produces a result.
#[derive(Error, Debug)]
pub enum Error {
    /// Backing store unreachable or query failed
    #[error("Sanctions store error: {0}")]
    Store(String),

    /// Postgres error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// CSV parsing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A single reference record could not be turned into an entity
    #[error("Malformed sanctions record {entry_id}: {reason}")]
    MalformedRecord {
        /// Identifier of the offending record (may be empty)
        entry_id: String,
        /// What was wrong with it
        reason: String,
    },
}

impl Error {
    /// Shorthand for a malformed record error
    pub fn malformed(entry_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedRecord {
            entry_id: entry_id.into(),
            reason: reason.into(),
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(format!("Failed to parse config: {}", err))
    }
}

impl From<prometheus::Error> for Error {
    fn from(err: prometheus::Error) -> Self {
        Error::Config(format!("Metrics registration failed: {}", err))
    }
}
