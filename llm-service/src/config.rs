//! Runtime configuration for the LLM service, loaded from environment
//! variables with validation.

use crate::error_handler::{ConfigResult, env_opt, must_env, validate_http_endpoint};

/// Configuration for the `/v1/responses` endpoint.
#[derive(Clone, Debug)]
pub struct LlmConfig {
    /// Base URL of the endpoint (e.g. `http://localhost:1234`).
    pub base_url: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Output token cap per request.
    pub max_output_tokens: u32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Additional attempts on timeout / 5xx (linear backoff).
    pub max_retries: u32,
}

impl LlmConfig {
    /// Build from environment variables.
    ///
    /// Recognized vars:
    /// - `LLM_BASE_URL` (required), `LLM_MODEL` (required)
    /// - `LLM_TEMPERATURE` (default 0.3)
    /// - `LLM_MAX_OUTPUT_TOKENS` (default 2000)
    /// - `LLM_TIMEOUT_SECS` (default 60)
    /// - `LLM_MAX_RETRIES` (default 2)
    ///
    /// # Errors
    /// Returns a [`crate::ConfigError`] on missing/invalid values.
    pub fn from_env() -> ConfigResult<Self> {
        let base_url = must_env("LLM_BASE_URL")?;
        validate_http_endpoint("LLM_BASE_URL", &base_url)?;
        let model = must_env("LLM_MODEL")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            temperature: env_opt("LLM_TEMPERATURE", "expected f32")?.unwrap_or(0.3),
            max_output_tokens: env_opt("LLM_MAX_OUTPUT_TOKENS", "expected u32")?.unwrap_or(2000),
            timeout_secs: env_opt("LLM_TIMEOUT_SECS", "expected u64")?.unwrap_or(60),
            max_retries: env_opt("LLM_MAX_RETRIES", "expected u32")?.unwrap_or(2),
        })
    }

    /// Config with explicit endpoint/model, defaults elsewhere. Used by tests
    /// and by callers that do not read the environment.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature: 0.3,
            max_output_tokens: 2000,
            timeout_secs: 60,
            max_retries: 2,
        }
    }
}
