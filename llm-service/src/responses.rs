//! Client for an OpenAI-style `/v1/responses` endpoint.
//!
//! Request shape: `{ model, input, temperature, max_output_tokens }`.
//! Response shape: an `output` array whose items are either a `reasoning`
//! block (`content[].type == "reasoning_text"`) or a `message` block
//! (`content[].type == "output_text"`). A top-level `text` field is accepted
//! as a legacy fallback.
//!
//! Retry policy: up to `max_retries` additional attempts on network timeout
//! or HTTP 5xx, with linear backoff (attempt-index seconds). 4xx responses
//! are not retried. Every attempt updates the shared circuit breaker; when
//! the breaker is open on entry the call fails immediately with
//! [`LlmError::Unavailable`] and no request is issued.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::breaker::CircuitBreaker;
use crate::config::LlmConfig;
use crate::error_handler::{LlmError, make_snippet, validate_http_endpoint};

/// Parsed result of a `/v1/responses` call.
#[derive(Debug, Clone)]
pub struct LlmOutput {
    /// Reasoning trace when the model emitted one.
    pub reasoning: Option<String>,
    /// Final output text.
    pub text: String,
}

/// Thin client for the responses endpoint.
///
/// Keeps one preconfigured `reqwest::Client` (timeout set at build time) and
/// a shared [`CircuitBreaker`] that callers also consult through the quality
/// tracker.
#[derive(Debug, Clone)]
pub struct ResponsesClient {
    client: reqwest::Client,
    cfg: LlmConfig,
    url: String,
    breaker: Arc<CircuitBreaker>,
}

impl ResponsesClient {
    /// Creates a new client from the given config and shared breaker.
    ///
    /// # Errors
    /// - [`LlmError::Config`] if the endpoint scheme is invalid
    /// - [`LlmError::Transport`] if the HTTP client cannot be built
    pub fn new(cfg: LlmConfig, breaker: Arc<CircuitBreaker>) -> Result<Self, LlmError> {
        validate_http_endpoint("LLM_BASE_URL", &cfg.base_url)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        let url = format!("{}/v1/responses", cfg.base_url.trim_end_matches('/'));

        info!(
            model = %cfg.model,
            endpoint = %cfg.base_url,
            timeout_secs = cfg.timeout_secs,
            max_retries = cfg.max_retries,
            "ResponsesClient initialized"
        );

        Ok(Self {
            client,
            cfg,
            url,
            breaker,
        })
    }

    /// Shared breaker handle (also held by the quality tracker).
    pub fn breaker(&self) -> Arc<CircuitBreaker> {
        Arc::clone(&self.breaker)
    }

    /// Generates output text for a single input prompt.
    ///
    /// # Errors
    /// - [`LlmError::Unavailable`] when the circuit is open on entry
    /// - [`LlmError::HttpStatus`] / [`LlmError::Transport`] after exhausted retries
    /// - [`LlmError::EmptyOutput`] when no text could be extracted
    pub async fn generate(&self, input: &str) -> Result<String, LlmError> {
        self.generate_with_reasoning(input).await.map(|o| o.text)
    }

    /// Generates output text plus the reasoning trace when present.
    pub async fn generate_with_reasoning(&self, input: &str) -> Result<LlmOutput, LlmError> {
        if self.breaker.is_open() {
            warn!(
                consecutive_failures = self.breaker.consecutive_failures(),
                "LLM circuit breaker open, refusing call"
            );
            return Err(LlmError::Unavailable);
        }

        let started = Instant::now();
        let body = ResponsesRequest {
            model: &self.cfg.model,
            input,
            temperature: self.cfg.temperature,
            max_output_tokens: self.cfg.max_output_tokens,
        };

        let mut last_err: Option<LlmError> = None;

        for attempt in 0..=self.cfg.max_retries {
            debug!(
                model = %self.cfg.model,
                input_len = input.len(),
                attempt,
                "POST {}", self.url
            );

            match self.client.post(&self.url).json(&body).send().await {
                Ok(resp) if resp.status().is_success() => {
                    let out: ResponsesResponse = match resp.json().await {
                        Ok(v) => v,
                        Err(e) => {
                            self.breaker.record_failure();
                            return Err(LlmError::Decode(format!(
                                "serde error: {e}; expected `output[].content[].text`"
                            )));
                        }
                    };
                    let parsed = extract_output(out)?;
                    self.breaker.record_success();
                    info!(
                        model = %self.cfg.model,
                        latency_ms = started.elapsed().as_millis(),
                        has_reasoning = parsed.reasoning.is_some(),
                        "responses call completed"
                    );
                    return Ok(parsed);
                }
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    let snippet = make_snippet(&text);
                    self.breaker.record_failure();
                    error!(
                        %status,
                        url = %self.url,
                        %snippet,
                        attempt,
                        "responses endpoint returned non-success status"
                    );
                    let err = LlmError::HttpStatus {
                        status,
                        url: self.url.clone(),
                        snippet,
                    };
                    if status.is_server_error() && attempt < self.cfg.max_retries {
                        last_err = Some(err);
                        tokio::time::sleep(Duration::from_secs(u64::from(attempt) + 1)).await;
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    self.breaker.record_failure();
                    let retryable = e.is_timeout() || e.is_connect();
                    warn!(
                        error = %e,
                        attempt,
                        retryable,
                        "responses call transport failure"
                    );
                    let err = LlmError::Transport(e);
                    if retryable && attempt < self.cfg.max_retries {
                        last_err = Some(err);
                        tokio::time::sleep(Duration::from_secs(u64::from(attempt) + 1)).await;
                        continue;
                    }
                    return Err(err);
                }
            }
        }

        Err(last_err.unwrap_or(LlmError::EmptyOutput))
    }
}

/// Walks the `output` array for reasoning and message blocks, falling back to
/// the legacy top-level `text` field.
fn extract_output(resp: ResponsesResponse) -> Result<LlmOutput, LlmError> {
    let mut reasoning = None;
    let mut text = None;

    for item in resp.output {
        match item.kind.as_str() {
            "reasoning" => {
                if reasoning.is_none() {
                    reasoning = item
                        .content
                        .into_iter()
                        .find(|b| b.kind == "reasoning_text")
                        .map(|b| b.text);
                }
            }
            "message" => {
                if text.is_none() {
                    text = item
                        .content
                        .into_iter()
                        .find(|b| b.kind == "output_text")
                        .map(|b| b.text);
                }
            }
            _ => {}
        }
    }

    match text.or(resp.text) {
        Some(t) => Ok(LlmOutput { reasoning, text: t }),
        None => Err(LlmError::EmptyOutput),
    }
}

/* ===========================================================================
HTTP payloads
======================================================================== */

/// Request body for `/v1/responses`.
#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: &'a str,
    temperature: f32,
    max_output_tokens: u32,
}

/// Response body for `/v1/responses`. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct ResponsesResponse {
    #[serde(default)]
    output: Vec<OutputItem>,
    /// Legacy fallback carrying the final text directly.
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> ResponsesResponse {
        serde_json::from_str(json).expect("valid fixture")
    }

    #[test]
    fn extracts_message_and_reasoning() {
        let resp = parse(
            r#"{"output":[
                {"type":"reasoning","content":[{"type":"reasoning_text","text":"thinking"}]},
                {"type":"message","content":[{"type":"output_text","text":"final"}]}
            ]}"#,
        );
        let out = extract_output(resp).expect("text present");
        assert_eq!(out.text, "final");
        assert_eq!(out.reasoning.as_deref(), Some("thinking"));
    }

    #[test]
    fn falls_back_to_legacy_text_field() {
        let resp = parse(r#"{"text":"plain"}"#);
        let out = extract_output(resp).expect("legacy text");
        assert_eq!(out.text, "plain");
        assert!(out.reasoning.is_none());
    }

    #[test]
    fn empty_output_is_an_error() {
        let resp = parse(r#"{"output":[]}"#);
        assert!(matches!(extract_output(resp), Err(LlmError::EmptyOutput)));
    }
}
