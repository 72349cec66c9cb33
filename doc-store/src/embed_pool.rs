//! Batched embedding with bounded concurrency and order preservation.

use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use crate::embed::EmbeddingProvider;
use crate::errors::StoreError;

/// Embeds a batch of texts, preserving input order.
///
/// # Errors
/// Returns the first provider error; on dimension mismatch the provider
/// surfaces [`StoreError::VectorSizeMismatch`].
pub async fn embed_texts(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    concurrency: usize,
) -> Result<Vec<Vec<f32>>, StoreError> {
    if texts.is_empty() {
        debug!("embed_texts: nothing to embed");
        return Ok(Vec::new());
    }

    info!(
        total = texts.len(),
        concurrency,
        "embed_texts: starting batch"
    );

    let mut results: Vec<(usize, Vec<f32>)> = stream::iter(texts.iter().enumerate())
        .map(|(i, text)| async move {
            let v = provider.embed(text).await?;
            Ok::<(usize, Vec<f32>), StoreError>((i, v))
        })
        .buffer_unordered(concurrency.max(1))
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<Result<Vec<_>, StoreError>>()?;

    results.sort_by_key(|(i, _)| *i);
    Ok(results.into_iter().map(|(_, v)| v).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::local::LocalEmbedder;

    #[tokio::test]
    async fn preserves_input_order() {
        let embedder = LocalEmbedder::new(32);
        let texts: Vec<String> = (0..20).map(|i| format!("text number {i}")).collect();
        let batched = embed_texts(&embedder, &texts, 8).await.unwrap();
        for (i, text) in texts.iter().enumerate() {
            let single = embedder.embed(text).await.unwrap();
            assert_eq!(batched[i], single, "order broken at index {i}");
        }
    }
}
