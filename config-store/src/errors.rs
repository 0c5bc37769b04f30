//! Error hierarchy for the persistence layer.

use thiserror::Error;

/// Convenient alias for store results.
pub type StoreResult<T> = Result<T, StoreError>;

/// Root error type for the config-store crate.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite failure that is not lock contention.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Lock contention persisted through every retry attempt.
    #[error("database locked after {attempts} attempts")]
    Contended { attempts: u32 },

    /// Artefact payload could not be (de)serialised.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A row the pipeline depends on is missing.
    #[error("{what} not found for {key}")]
    NotFound { what: &'static str, key: String },

    /// Filesystem failure while creating the database location.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
