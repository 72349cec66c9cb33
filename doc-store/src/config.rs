//! Store and embedding configuration.

use crate::errors::StoreError;

/// Connection settings for the document store's query service.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Base URL of the query service (e.g. `http://localhost:8093`).
    pub base_url: String,
    pub bucket: String,
    pub username: String,
    pub password: String,
}

impl StoreConfig {
    /// Build from environment variables.
    ///
    /// Recognized vars:
    /// - COUCHBASE_URL (required), COUCHBASE_BUCKET (required)
    /// - COUCHBASE_USER, COUCHBASE_PASSWORD
    pub fn from_env() -> Result<Self, StoreError> {
        use std::env;
        let base_url = env::var("COUCHBASE_URL")
            .map_err(|_| StoreError::Config("COUCHBASE_URL is required".into()))?;
        let bucket = env::var("COUCHBASE_BUCKET")
            .map_err(|_| StoreError::Config("COUCHBASE_BUCKET is required".into()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket,
            username: env::var("COUCHBASE_USER").unwrap_or_default(),
            password: env::var("COUCHBASE_PASSWORD").unwrap_or_default(),
        })
    }

    /// Validates mandatory fields.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.base_url.trim().is_empty() {
            return Err(StoreError::Config("empty COUCHBASE_URL".into()));
        }
        if self.bucket.trim().is_empty() {
            return Err(StoreError::Config("empty COUCHBASE_BUCKET".into()));
        }
        if self.bucket.contains('`') {
            return Err(StoreError::Config("bucket name must not contain `".into()));
        }
        Ok(())
    }
}

/// Which embedding implementation to use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbeddingBackend {
    /// Deterministic in-process vectors; no network.
    Local,
    /// HTTP embedding server.
    Remote,
}

/// Embedding provider settings.
#[derive(Clone, Debug)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    /// Base URL of the remote embedding server.
    pub url: String,
    pub model: String,
    /// Expected embedding dimensionality.
    pub dim: usize,
    /// Parallelism for provider calls.
    pub concurrency: usize,
}

impl EmbeddingConfig {
    /// Build from environment variables.
    ///
    /// Recognized vars:
    /// - EMBEDDING_BACKEND = local|remote (default: local)
    /// - EMBEDDING_URL (default: http://localhost:11434)
    /// - EMBEDDING_MODEL (default: nomic-embed-text)
    /// - EMBEDDING_DIM (default: 768)
    /// - EMBEDDING_CONCURRENCY (default: 4)
    pub fn from_env() -> Result<Self, StoreError> {
        use std::env;
        let backend = match env::var("EMBEDDING_BACKEND")
            .unwrap_or_else(|_| "local".into())
            .to_lowercase()
            .as_str()
        {
            "local" => EmbeddingBackend::Local,
            "remote" => EmbeddingBackend::Remote,
            other => {
                return Err(StoreError::Config(format!(
                    "unknown EMBEDDING_BACKEND: {other}"
                )));
            }
        };

        Ok(Self {
            backend,
            url: env::var("EMBEDDING_URL").unwrap_or_else(|_| "http://localhost:11434".into()),
            model: env::var("EMBEDDING_MODEL").unwrap_or_else(|_| "nomic-embed-text".into()),
            dim: env::var("EMBEDDING_DIM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(768),
            concurrency: env::var("EMBEDDING_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(4),
        })
    }
}
