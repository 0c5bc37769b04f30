//! Stage results.
//!
//! Every pipeline stage returns `Result<T, StageError>`; the orchestrator
//! never retries a stage. A failure terminates the run with the error
//! captured on the run record, and previously persisted artefacts remain
//! for forensics.

use thiserror::Error;

/// Classified failure kind, mirroring the system error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageErrorKind {
    /// Bad request: unknown service, missing environment, invalid input.
    Input,
    /// Terminal auth failure against the forge.
    Auth,
    /// A required branch or artefact is missing.
    NotFound,
    /// Store failure.
    Storage,
    /// Local git plumbing failure.
    Git,
    /// Forge REST failure (post-retry).
    Forge,
    /// Drift analysis failure.
    Analysis,
    /// Cooperative cancellation.
    Cancelled,
    /// Anything else.
    Fatal,
}

/// A stage failure with its origin stage.
#[derive(Debug, Clone, Error)]
#[error("stage {stage} failed ({kind:?}): {message}")]
pub struct StageError {
    pub stage: &'static str,
    pub kind: StageErrorKind,
    pub message: String,
}

impl StageError {
    pub fn new(stage: &'static str, kind: StageErrorKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
        }
    }

    pub fn cancelled(stage: &'static str) -> Self {
        Self::new(stage, StageErrorKind::Cancelled, "run cancelled")
    }

    pub fn input(stage: &'static str, message: impl Into<String>) -> Self {
        Self::new(stage, StageErrorKind::Input, message)
    }
}

pub fn storage_err(stage: &'static str) -> impl FnOnce(config_store::StoreError) -> StageError {
    move |e| StageError::new(stage, StageErrorKind::Storage, e.to_string())
}

pub fn git_err(stage: &'static str) -> impl FnOnce(git_ops::GitOpsError) -> StageError {
    move |e| StageError::new(stage, StageErrorKind::Git, e.to_string())
}

pub fn forge_err(stage: &'static str) -> impl FnOnce(forge_client::ForgeError) -> StageError {
    move |e| {
        let kind = match &e {
            forge_client::ForgeError::Unauthorized | forge_client::ForgeError::Forbidden => {
                StageErrorKind::Auth
            }
            forge_client::ForgeError::NotFound => StageErrorKind::NotFound,
            _ => StageErrorKind::Forge,
        };
        StageError::new(stage, kind, e.to_string())
    }
}
