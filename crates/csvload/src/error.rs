//! Error types for the ingestion loop

use std::path::PathBuf;
use thiserror::Error;

/// Result type for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Everything that can stop a run
///
/// A missing checkpoint row is not an error (lookups return `Ok(None)`), and
/// a missing expected column is only logged. Every variant here is fatal.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Configuration error: {0}. Check your environment variables or .env file.")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DbError),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Source directory does not exist: {0}")]
    SourceDirMissing(PathBuf),

    #[error("Malformed CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Malformed CSV in {path}: line {line} has {found} fields, but the header has {expected}")]
    TooManyFields {
        path: PathBuf,
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("{0} has no header row")]
    EmptySource(PathBuf),

    #[error("Invalid identifier '{0}': table and column names must be 1 to 63 bytes long")]
    InvalidIdentifier(String),

    #[error("Table name '{0}' is reserved for checkpoint bookkeeping. Rename the source file.")]
    ReservedTable(String),

    #[error(transparent)]
    Common(#[from] csvload_common::CommonError),
}

impl IngestError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Attach the offending path to an IO error
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach the offending path to a CSV error
    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }
}

impl From<sqlx::Error> for IngestError {
    fn from(err: sqlx::Error) -> Self {
        IngestError::Database(crate::db::DbError::from(err))
    }
}
