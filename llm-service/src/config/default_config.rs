//! Default LLM configs loaded strictly from environment variables.
//!
//! Two roles are used by the pipeline:
//!
//! - **Slow** → high-quality model, used for triage adjudication
//! - **Fast** → lower-latency model, reserved for cheap draft work
//!
//! # Environment variables
//!
//! Common:
//! - `LLM_KIND` = provider kind (`ollama` or `openai`, default `ollama`)
//! - `LLM_MAX_TOKENS` = optional max tokens (u32); triage requires ≥ 8000
//!   and raises the floor itself when unset
//!
//! Ollama-specific:
//! - `OLLAMA_URL` or `OLLAMA_PORT` = endpoint (mandatory)
//! - `OLLAMA_MODEL`                = slow/quality model (mandatory)
//! - `OLLAMA_MODEL_FAST`           = fast model (falls back to `OLLAMA_MODEL`)
//!
//! OpenAI-specific:
//! - `OPENAI_URL`     = endpoint base (default `https://api.openai.com`)
//! - `OPENAI_API_KEY` = key (mandatory)
//! - `OPENAI_MODEL`   = slow/quality model (mandatory)
//! - `OPENAI_MODEL_FAST` = fast model (falls back to `OPENAI_MODEL`)

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{ConfigError, LlmError, env_opt_u32, must_env},
};

/// Resolves the Ollama endpoint strictly from environment.
///
/// Precedence:
/// 1. `OLLAMA_URL` if present and non-empty
/// 2. `OLLAMA_PORT` → `http://localhost:{port}`
fn ollama_endpoint() -> Result<String, LlmError> {
    if let Ok(url) = std::env::var("OLLAMA_URL") {
        if !url.trim().is_empty() {
            return Ok(url);
        }
    }
    if let Ok(port) = std::env::var("OLLAMA_PORT") {
        if !port.trim().is_empty() {
            let _ = port
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidNumber {
                    var: "OLLAMA_PORT",
                    reason: "expected u16 (1..=65535)",
                })?;
            return Ok(format!("http://localhost:{port}"));
        }
    }
    Err(LlmError::Config(ConfigError::MissingVar(
        "OLLAMA_URL or OLLAMA_PORT",
    )))
}

/// Constructs the **slow/quality** Ollama config.
pub fn config_ollama_slow() -> Result<LlmModelConfig, LlmError> {
    let endpoint = ollama_endpoint()?;
    let model = must_env("OLLAMA_MODEL")?;
    let max_tokens = env_opt_u32("LLM_MAX_TOKENS")?;

    Ok(LlmModelConfig {
        provider: LlmProvider::Ollama,
        model,
        endpoint,
        api_key: None,
        max_tokens,
        temperature: Some(0.2),
        top_p: None,
        timeout_secs: Some(600),
    })
}

/// Constructs the **fast/speed** Ollama config.
pub fn config_ollama_fast() -> Result<LlmModelConfig, LlmError> {
    let endpoint = ollama_endpoint()?;
    let model = std::env::var("OLLAMA_MODEL_FAST")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(Ok)
        .unwrap_or_else(|| must_env("OLLAMA_MODEL").map_err(Into::<LlmError>::into))?;
    let max_tokens = env_opt_u32("LLM_MAX_TOKENS")?;

    Ok(LlmModelConfig {
        provider: LlmProvider::Ollama,
        model,
        endpoint,
        api_key: None,
        max_tokens,
        temperature: Some(0.7),
        top_p: Some(0.9),
        timeout_secs: Some(600),
    })
}

/// Constructs the **slow/quality** OpenAI config.
pub fn config_openai_slow() -> Result<LlmModelConfig, LlmError> {
    let endpoint =
        std::env::var("OPENAI_URL").unwrap_or_else(|_| "https://api.openai.com".to_string());
    let api_key = must_env("OPENAI_API_KEY")?;
    let model = must_env("OPENAI_MODEL")?;
    let max_tokens = env_opt_u32("LLM_MAX_TOKENS")?;

    Ok(LlmModelConfig {
        provider: LlmProvider::OpenAI,
        model,
        endpoint,
        api_key: Some(api_key),
        max_tokens,
        temperature: Some(0.2),
        top_p: None,
        timeout_secs: Some(600),
    })
}

/// Constructs the **fast/speed** OpenAI config.
pub fn config_openai_fast() -> Result<LlmModelConfig, LlmError> {
    let mut cfg = config_openai_slow()?;
    if let Ok(fast) = std::env::var("OPENAI_MODEL_FAST") {
        if !fast.trim().is_empty() {
            cfg.model = fast;
        }
    }
    cfg.temperature = Some(0.7);
    cfg.top_p = Some(0.9);
    Ok(cfg)
}

/// Resolves the `(fast, slow)` configs for the provider selected by
/// `LLM_KIND` (default `ollama`).
pub fn profiles_from_env() -> Result<(LlmModelConfig, LlmModelConfig), LlmError> {
    let kind = std::env::var("LLM_KIND").unwrap_or_else(|_| "ollama".to_string());
    match kind.to_ascii_lowercase().as_str() {
        "ollama" => Ok((config_ollama_fast()?, config_ollama_slow()?)),
        "openai" | "chatgpt" => Ok((config_openai_fast()?, config_openai_slow()?)),
        other => Err(LlmError::Config(ConfigError::UnsupportedProvider(
            other.to_string(),
        ))),
    }
}
