//! Triage-engine errors.

use thiserror::Error;

pub type TriageResult<T> = Result<T, TriageError>;

#[derive(Debug, Error)]
pub enum TriageError {
    /// LLM transport/generation failure. Per-batch, this routes the batch to
    /// the rule-based fallback rather than failing the stage.
    #[error(transparent)]
    Llm(#[from] llm_service::LlmError),

    /// Recovered JSON did not satisfy the bucket schema.
    #[error("llm output schema violation: {0}")]
    Schema(String),
}
