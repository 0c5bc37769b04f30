//! Crate-wide error hierarchy for forge-client.

use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type ForgeResult<T> = Result<T, ForgeError>;

/// Root error type for the forge-client crate.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// Authentication rejected (HTTP 401). Terminal for the affected group.
    #[error("unauthorized: forge token is invalid or expired")]
    Unauthorized,

    /// Token lacks permission (HTTP 403). Terminal for the affected group.
    #[error("forbidden: forge token lacks access to this namespace")]
    Forbidden,

    /// Resource not found (HTTP 404). Handled per call-site: a missing group
    /// falls through to the user-namespace endpoint, a missing branch is a
    /// plain `false`.
    #[error("not found")]
    NotFound,

    /// Rate limited (HTTP 429). Retry-eligible.
    #[error("rate limited")]
    RateLimited {
        /// Optional `Retry-After` hint in seconds when available.
        retry_after_secs: Option<u64>,
    },

    /// Gateway / server error (HTTP 5xx). Retry-eligible.
    #[error("server error: status {0}")]
    Server(u16),

    /// Other non-2xx HTTP status not covered by specific variants.
    #[error("http status error: status {0}")]
    HttpStatus(u16),

    /// Timeout at transport level. Retry-eligible.
    #[error("timeout")]
    Timeout,

    /// Network/transport failure without HTTP status (DNS/connect/reset).
    /// Retry-eligible.
    #[error("network error: {0}")]
    Network(String),

    /// Unexpected/invalid shape of forge response.
    #[error("invalid forge response: {0}")]
    InvalidResponse(String),

    /// Configuration problems (missing token, bad base URL).
    #[error("forge configuration error: {0}")]
    Config(String),
}

impl ForgeError {
    /// Whether a retry with backoff may succeed.
    ///
    /// Auth and not-found failures are terminal; only rate limiting, server
    /// errors and transport-level faults qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ForgeError::RateLimited { .. }
                | ForgeError::Server(_)
                | ForgeError::Timeout
                | ForgeError::Network(_)
        )
    }
}

impl From<reqwest::Error> for ForgeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return ForgeError::Timeout;
        }

        if let Some(status) = e.status() {
            let code = status.as_u16();
            return match code {
                401 => ForgeError::Unauthorized,
                403 => ForgeError::Forbidden,
                404 => ForgeError::NotFound,
                429 => ForgeError::RateLimited {
                    retry_after_secs: None,
                },
                500..=599 => ForgeError::Server(code),
                _ => ForgeError::HttpStatus(code),
            };
        }

        if e.is_decode() {
            return ForgeError::InvalidResponse(e.to_string());
        }

        ForgeError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_eligibility_by_kind() {
        assert!(ForgeError::Server(502).is_retryable());
        assert!(
            ForgeError::RateLimited {
                retry_after_secs: None
            }
            .is_retryable()
        );
        assert!(ForgeError::Timeout.is_retryable());
        assert!(!ForgeError::Unauthorized.is_retryable());
        assert!(!ForgeError::Forbidden.is_retryable());
        assert!(!ForgeError::NotFound.is_retryable());
    }
}
