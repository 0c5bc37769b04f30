//! Shared LLM service with providers (Ollama/OpenAI) and streaming text
//! completion.
//!
//! The pipeline consumes one call shape: send a prompt, receive the full
//! completion accumulated from the provider's stream. Cancellation is
//! cooperative - dropping the generation future aborts the in-flight HTTP
//! read.

pub mod config;
pub mod error_handler;
pub mod service_profiles;
pub mod services;

pub use config::default_config::{
    config_ollama_fast, config_ollama_slow, config_openai_fast, config_openai_slow,
    profiles_from_env,
};
pub use config::llm_model_config::LlmModelConfig;
pub use config::llm_provider::LlmProvider;
pub use error_handler::{ConfigError, LlmError, LlmResult};
pub use service_profiles::LlmServiceProfiles;
