//! Shared LLM service for the ingestion pipeline.
//!
//! Wraps an OpenAI-style `/v1/responses` endpoint with:
//! - per-request timeout and linear-backoff retries,
//! - a consecutive-failure circuit breaker shared with callers,
//! - the four summarization prompts (symbol/file/module/repo),
//! - the semantic chunker passes with tolerant JSON extraction.
//!
//! Errors are normalized via the unified types in `error_handler`.

pub mod breaker;
pub mod chunker;
pub mod config;
pub mod enricher;
pub mod error_handler;
pub mod responses;
pub mod telemetry;

pub use breaker::CircuitBreaker;
pub use chunker::{LlmChunker, SemanticChunk};
pub use config::LlmConfig;
pub use enricher::{Enrichment, Summarizer};
pub use error_handler::{ConfigError, LlmError};
pub use responses::{LlmOutput, ResponsesClient};
