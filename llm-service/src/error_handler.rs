//! Error types and validation helpers for `llm-service`.
//!
//! All config error messages include the suffix `[LLM Service]` so that logs
//! and bubbled-up errors can be attributed to this library.

use thiserror::Error;

/// Convenient result alias for config operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Error enum for environment/config-driven setup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable is missing or empty.
    #[error("[LLM Service] missing required environment variable: {0}")]
    MissingVar(&'static str),

    /// A number failed to parse (like limits or timeouts).
    #[error("[LLM Service] invalid number in {var}: {reason}")]
    InvalidNumber {
        var: &'static str,
        reason: &'static str,
    },

    /// Value had the wrong format (e.g., invalid URL).
    #[error("[LLM Service] invalid format in {var}: {reason}")]
    InvalidFormat {
        var: &'static str,
        reason: &'static str,
    },

    /// Model name was empty or invalid.
    #[error("[LLM Service] model name must not be empty")]
    EmptyModel,
}

/// Runtime errors raised by the responses client and its callers.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Circuit breaker is open; no network request was issued.
    #[error("LLM unavailable: circuit breaker open")]
    Unavailable,

    /// Endpoint returned a non-success status after exhausting retries.
    #[error("LLM HTTP {status} from {url}: {snippet}")]
    HttpStatus {
        status: reqwest::StatusCode,
        url: String,
        snippet: String,
    },

    /// Transport-level failure (connect, timeout, TLS, ...).
    #[error("LLM transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body did not match any accepted shape.
    #[error("LLM decode error: {0}")]
    Decode(String),

    /// `output` contained no message text and no legacy fallback.
    #[error("LLM response contained no output text")]
    EmptyOutput,

    /// Invalid configuration detected at construction time.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/* ------------------------ Env helpers ------------------------ */

/// Fetches a required, non-empty environment variable.
pub fn must_env(name: &'static str) -> ConfigResult<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(name)),
    }
}

/// Parses an optional value from env (`Ok(None)` if unset/empty).
pub fn env_opt<T: std::str::FromStr>(
    name: &'static str,
    reason: &'static str,
) -> ConfigResult<Option<T>> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => v
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { var: name, reason }),
        _ => Ok(None),
    }
}

/// Validates that an HTTP endpoint starts with `http://` or `https://`.
pub fn validate_http_endpoint(var: &'static str, value: &str) -> ConfigResult<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidFormat {
            var,
            reason: "must start with http:// or https://",
        })
    }
}

/// Clips a response body to a short, log-friendly snippet.
pub fn make_snippet(body: &str) -> String {
    const MAX: usize = 240;
    let trimmed = body.trim();
    if trimmed.len() <= MAX {
        trimmed.to_string()
    } else {
        let mut end = MAX;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &trimmed[..end])
    }
}
