//! Drift-engine errors.
//!
//! Parse failures deliberately do not appear here: unparseable config input
//! degrades to an empty keypath map with a logged warning, per the engine's
//! contract. Only tree-level I/O problems abort an analysis.

use thiserror::Error;

pub type DriftResult<T> = Result<T, DriftError>;

#[derive(Debug, Error)]
pub enum DriftError {
    /// Filesystem failure while enumerating or reading a tree.
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A supplied analysis root does not exist or is not a directory.
    #[error("analysis root missing: {0}")]
    RootMissing(String),
}

impl DriftError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        DriftError::Io {
            path: path.into(),
            source,
        }
    }
}
