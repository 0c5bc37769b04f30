//! Error types and validation helpers for `llm-service`.
//!
//! All error messages include the suffix `[LLM Service]` so that logs and
//! bubbled-up errors can be easily attributed to this library.

use reqwest::StatusCode;
use thiserror::Error;

/// Convenient result alias for LLM operations.
pub type LlmResult<T> = Result<T, LlmError>;

/// Root error type for LLM configuration and generation.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Environment/config-driven setup failure.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The provider in the config does not match the constructed service.
    #[error("[LLM Service] invalid provider for this service")]
    InvalidProvider,

    /// Invalid endpoint (empty or missing http/https).
    #[error("[LLM Service] invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Provider requires an API key but none was configured.
    #[error("[LLM Service] missing api key")]
    MissingApiKey,

    /// Transport/HTTP client error.
    #[error("[LLM Service] transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-successful HTTP status from upstream.
    #[error("[LLM Service] unexpected HTTP status {status} from {url}: {snippet}")]
    HttpStatus {
        status: StatusCode,
        url: String,
        /// Short snippet of the response body.
        snippet: String,
    },

    /// Unexpected/invalid JSON chunk in a streaming response.
    #[error("[LLM Service] failed to decode stream chunk: {0}")]
    Decode(String),
}

/// Error enum for environment/config-driven setup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable is missing or empty.
    #[error("[LLM Service] missing required environment variable: {0}")]
    MissingVar(&'static str),

    /// A number failed to parse (ports, token limits).
    #[error("[LLM Service] invalid number in {var}: {reason}")]
    InvalidNumber {
        var: &'static str,
        reason: &'static str,
    },

    /// Unsupported provider in `LLM_KIND`.
    #[error("[LLM Service] unsupported provider: {0}")]
    UnsupportedProvider(String),
}

/* ------------------------ Env helpers ------------------------ */

/// Fetches a required, non-empty environment variable.
///
/// # Errors
/// Returns [`ConfigError::MissingVar`] if the variable is absent or empty.
pub fn must_env(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(name)),
    }
}

/// Parses an optional `u32` from env (`Ok(None)` if unset/empty).
///
/// # Errors
/// Returns [`ConfigError::InvalidNumber`] if the variable is set but not a
/// valid `u32`.
pub fn env_opt_u32(name: &'static str) -> Result<Option<u32>, ConfigError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => {
            v.parse::<u32>()
                .map(Some)
                .map_err(|_| ConfigError::InvalidNumber {
                    var: name,
                    reason: "expected u32",
                })
        }
        _ => Ok(None),
    }
}

/// Truncates a response body for error reporting.
pub fn make_snippet(body: &str) -> String {
    body.chars().take(240).collect()
}
