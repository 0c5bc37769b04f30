//! Shared LLM service with two active profiles: `fast` and `slow`.
//!
//! - Lives in the same Tokio runtime as the application.
//! - Construct once, wrap in `Arc`, and pass clones to dependents.
//! - If the `slow` profile is not provided, it falls back to `fast`.

use std::time::Instant;

use tracing::info;

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{LlmError, LlmResult},
    services::{ollama_service::OllamaService, open_ai_service::OpenAiService},
};

enum ProviderService {
    Ollama(OllamaService),
    OpenAi(OpenAiService),
}

impl ProviderService {
    fn build(cfg: LlmModelConfig) -> Result<Self, LlmError> {
        match cfg.provider {
            LlmProvider::Ollama => Ok(Self::Ollama(OllamaService::new(cfg)?)),
            LlmProvider::OpenAI => Ok(Self::OpenAi(OpenAiService::new(cfg)?)),
        }
    }

    async fn generate(&self, prompt: &str, system: Option<&str>) -> LlmResult<String> {
        match self {
            Self::Ollama(c) => c.generate(prompt, system).await,
            Self::OpenAi(c) => c.generate(prompt, system).await,
        }
    }
}

/// Service managing the two logical LLM profiles.
pub struct LlmServiceProfiles {
    fast_cfg: LlmModelConfig,
    slow_cfg: LlmModelConfig,
    fast: ProviderService,
    slow: ProviderService,
}

impl LlmServiceProfiles {
    /// Creates a new service with two profiles.
    ///
    /// - `fast`: required fast profile (draft/speed).
    /// - `slow_opt`: optional slow profile (quality). If `None`, falls back
    ///   to `fast`.
    pub fn new(fast: LlmModelConfig, slow_opt: Option<LlmModelConfig>) -> Result<Self, LlmError> {
        let slow = slow_opt.unwrap_or_else(|| fast.clone());

        info!(
            fast.provider = %fast.provider,
            fast.model = %fast.model,
            slow.provider = %slow.provider,
            slow.model = %slow.model,
            "LlmServiceProfiles initialized"
        );

        Ok(Self {
            fast: ProviderService::build(fast.clone())?,
            slow: ProviderService::build(slow.clone())?,
            fast_cfg: fast,
            slow_cfg: slow,
        })
    }

    /// Builds the service from environment-configured profiles.
    pub fn from_env() -> Result<Self, LlmError> {
        let (fast, slow) = crate::config::default_config::profiles_from_env()?;
        Self::new(fast, Some(slow))
    }

    /// Generates text using the **fast** profile, streaming internally and
    /// returning the accumulated completion.
    pub async fn generate_fast(&self, prompt: &str, system: Option<&str>) -> LlmResult<String> {
        let started = Instant::now();
        let out = self.fast.generate(prompt, system).await;
        if out.is_ok() {
            info!(
                provider = %self.fast_cfg.provider,
                model = %self.fast_cfg.model,
                latency_ms = started.elapsed().as_millis() as u64,
                "fast generation completed"
            );
        }
        out
    }

    /// Generates text using the **slow** profile.
    ///
    /// Falls back to the fast profile if the slow profile was not specified
    /// at creation.
    pub async fn generate_slow(&self, prompt: &str, system: Option<&str>) -> LlmResult<String> {
        let started = Instant::now();
        let out = self.slow.generate(prompt, system).await;
        if out.is_ok() {
            info!(
                provider = %self.slow_cfg.provider,
                model = %self.slow_cfg.model,
                latency_ms = started.elapsed().as_millis() as u64,
                "slow generation completed"
            );
        }
        out
    }

    /// Returns references to the current profiles `(fast, slow)`.
    pub fn profiles(&self) -> (&LlmModelConfig, &LlmModelConfig) {
        (&self.fast_cfg, &self.slow_cfg)
    }
}
