//! Remote embedding provider speaking the Ollama embeddings API.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingConfig;
use crate::embed::EmbeddingProvider;
use crate::errors::StoreError;

/// HTTP embedding provider (async).
#[derive(Clone)]
pub struct OllamaEmbedder {
    client: Client,
    url: String,
    model: String,
    dim: usize,
}

impl OllamaEmbedder {
    pub fn new(cfg: &EmbeddingConfig) -> Self {
        Self {
            client: Client::new(),
            url: cfg.url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            dim: cfg.dim,
        }
    }
}

impl EmbeddingProvider for OllamaEmbedder {
    fn embed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<f32>, StoreError>> + Send + 'a>>
    {
        Box::pin(async move {
            #[derive(Serialize)]
            struct Request<'a> {
                model: &'a str,
                prompt: &'a str,
            }

            #[derive(Deserialize)]
            struct Response {
                embedding: Vec<f32>,
            }

            let req = Request {
                model: &self.model,
                prompt: text,
            };

            let resp = self
                .client
                .post(format!("{}/api/embeddings", self.url))
                .json(&req)
                .send()
                .await
                .map_err(|e| StoreError::Provider(format!("embedding request failed: {e}")))?
                .error_for_status()
                .map_err(|e| StoreError::Provider(format!("embedding HTTP error: {e}")))?;

            let parsed: Response = resp
                .json()
                .await
                .map_err(|e| StoreError::Provider(format!("embedding JSON parse failed: {e}")))?;

            if parsed.embedding.len() != self.dim {
                return Err(StoreError::VectorSizeMismatch {
                    got: parsed.embedding.len(),
                    want: self.dim,
                });
            }

            Ok(parsed.embedding)
        })
    }

    fn dim(&self) -> usize {
        self.dim
    }
}
