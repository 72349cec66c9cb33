//! Embedding provider contract.

pub mod local;
pub mod ollama;

use crate::errors::StoreError;

/// Prefix prepended to document text before encoding.
pub const DOC_PREFIX: &str = "search_document: ";
/// Prefix prepended to query text before encoding.
pub const QUERY_PREFIX: &str = "search_query: ";

/// Embedding backend (async).
///
/// Implementations return a fixed-dimension vector suitable for cosine
/// similarity; callers may assume the vector is normalized.
pub trait EmbeddingProvider: Send + Sync {
    fn embed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<f32>, StoreError>> + Send + 'a>>;

    /// Expected output dimensionality.
    fn dim(&self) -> usize;
}
