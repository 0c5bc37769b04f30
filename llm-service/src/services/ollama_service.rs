//! Streaming Ollama client for text generation.
//!
//! Implements a thin client for the local Ollama API:
//! - `POST {endpoint}/api/generate` with `stream=true`
//!
//! The response is an NDJSON stream of chunks; this service accumulates the
//! `response` field of each chunk into a single buffer and returns it when
//! the stream reports `done`. Dropping the returned future aborts the
//! in-flight HTTP read, which is how cancellation propagates.

use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::llm_model_config::LlmModelConfig;
use crate::config::llm_provider::LlmProvider;
use crate::error_handler::{LlmError, LlmResult, make_snippet};

/// Thin streaming client for Ollama.
#[derive(Debug)]
pub struct OllamaService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    url_generate: String,
}

impl OllamaService {
    /// Creates a new [`OllamaService`] from the given config.
    ///
    /// # Errors
    /// - [`LlmError::InvalidProvider`] if `cfg.provider` is not `Ollama`
    /// - [`LlmError::InvalidEndpoint`] if `cfg.endpoint` is invalid
    /// - [`LlmError::Transport`] if the HTTP client cannot be built
    pub fn new(cfg: LlmModelConfig) -> LlmResult<Self> {
        if cfg.provider != LlmProvider::Ollama {
            return Err(LlmError::InvalidProvider);
        }

        let endpoint = cfg.endpoint.trim();
        if endpoint.is_empty()
            || !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(LlmError::InvalidEndpoint(cfg.endpoint));
        }

        let timeout = cfg
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(600));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .brotli(true)
            .build()?;

        let url_generate = format!("{}/api/generate", endpoint.trim_end_matches('/'));

        Ok(Self {
            client,
            cfg,
            url_generate,
        })
    }

    /// Performs a **streaming** generation request and accumulates the full
    /// completion.
    ///
    /// Mapped options: `model`, `num_predict ← max_tokens`, `temperature`,
    /// `top_p`. An optional system instruction is prepended to the prompt.
    ///
    /// # Errors
    /// - [`LlmError::HttpStatus`] for non-2xx responses
    /// - [`LlmError::Transport`] for client/stream errors
    /// - [`LlmError::Decode`] if a chunk cannot be parsed
    #[instrument(skip_all, fields(model = %self.cfg.model))]
    pub async fn generate(&self, prompt: &str, system: Option<&str>) -> LlmResult<String> {
        let full_prompt = match system {
            Some(sys) => format!("{sys}\n\n{prompt}"),
            None => prompt.to_string(),
        };
        let body = GenerateRequest::from_cfg(&self.cfg, &full_prompt);

        debug!("POST {} (stream)", self.url_generate);
        let resp = self
            .client
            .post(&self.url_generate)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let url = self.url_generate.clone();
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::HttpStatus {
                status,
                url,
                snippet: make_snippet(&text),
            });
        }

        let mut stream = resp.bytes_stream();
        let mut pending = String::new();
        let mut out = String::new();
        let mut chunks = 0usize;

        while let Some(item) = stream.next().await {
            let bytes = item?;
            pending.push_str(&String::from_utf8_lossy(&bytes));

            // NDJSON: consume every complete line, keep the partial tail.
            while let Some(pos) = pending.find('\n') {
                let line: String = pending.drain(..=pos).collect();
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let chunk: GenerateChunk = serde_json::from_str(line)
                    .map_err(|e| LlmError::Decode(format!("bad NDJSON chunk: {e}")))?;
                out.push_str(&chunk.response);
                chunks += 1;
                if chunk.done {
                    debug!(chunks, total_chars = out.len(), "stream complete");
                    return Ok(out);
                }
            }
        }

        // Stream ended without a `done` marker; parse any trailing buffer.
        let tail = pending.trim();
        if !tail.is_empty() {
            if let Ok(chunk) = serde_json::from_str::<GenerateChunk>(tail) {
                out.push_str(&chunk.response);
            }
        }
        debug!(chunks, total_chars = out.len(), "stream ended without done marker");
        Ok(out)
    }
}

/* ==========================
HTTP payloads & options
========================== */

/// Request body for `/api/generate` (streaming).
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerateOptions>,
}

impl<'a> GenerateRequest<'a> {
    fn from_cfg(cfg: &'a LlmModelConfig, prompt: &'a str) -> Self {
        let options = GenerateOptions {
            temperature: cfg.temperature,
            top_p: cfg.top_p,
            num_predict: cfg.max_tokens,
        };

        Self {
            model: &cfg.model,
            prompt,
            stream: true,
            options: Some(options),
        }
    }
}

/// Subset of Ollama `options`.
#[derive(Debug, Default, Serialize)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// One NDJSON chunk of a streaming `/api/generate` response.
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
}
