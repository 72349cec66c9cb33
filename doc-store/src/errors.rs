//! Error types used across the store library.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("config error: {0}")]
    Config(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("query failed ({status}): {snippet}")]
    Query { status: String, snippet: String },

    #[error("embedding provider error: {0}")]
    Provider(String),

    #[error("vector size mismatch: got={got}, want={want}")]
    VectorSizeMismatch { got: usize, want: usize },
}
