//! Deterministic in-process embedding provider.
//!
//! Hashed bag-of-features over word tokens and character trigrams, L2
//! normalized. Not semantically meaningful like a trained model, but stable
//! (same text ⇒ same vector), cosine-ready, and dependency-free — the
//! `EMBEDDING_BACKEND=local` option and the backbone of the test suite.

use sha2::{Digest, Sha256};

use crate::embed::EmbeddingProvider;
use crate::errors::StoreError;

#[derive(Debug, Clone)]
pub struct LocalEmbedder {
    dim: usize,
}

impl LocalEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(8) }
    }

    fn bucket(&self, feature: &str) -> (usize, f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let idx = u64::from_be_bytes(digest[..8].try_into().expect("8 bytes")) as usize % self.dim;
        // Sign from another digest byte spreads features over both halves.
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        (idx, sign)
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dim];

        for word in text.split(|c: char| !c.is_alphanumeric() && c != '_') {
            if word.is_empty() {
                continue;
            }
            let word = word.to_lowercase();
            let (idx, sign) = self.bucket(&word);
            vec[idx] += sign;

            let chars: Vec<char> = word.chars().collect();
            for tri in chars.windows(3) {
                let tri: String = tri.iter().collect();
                let (idx, sign) = self.bucket(&format!("tri:{tri}"));
                vec[idx] += 0.5 * sign;
            }
        }

        let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vec {
                *v /= norm;
            }
        }
        vec
    }
}

impl EmbeddingProvider for LocalEmbedder {
    fn embed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<f32>, StoreError>> + Send + 'a>>
    {
        Box::pin(async move { Ok(self.encode(text)) })
    }

    fn dim(&self) -> usize {
        self.dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn deterministic_and_normalized() {
        let embedder = LocalEmbedder::new(64);
        let a = embedder.embed("parse the configuration file").await.unwrap();
        let b = embedder.embed("parse the configuration file").await.unwrap();
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn similar_texts_score_higher_than_unrelated() {
        let embedder = LocalEmbedder::new(256);
        let base = embedder.embed("parse configuration file loader").await.unwrap();
        let near = embedder.embed("configuration file parser").await.unwrap();
        let far = embedder.embed("tokio async runtime executor").await.unwrap();
        assert!(cosine(&base, &near) > cosine(&base, &far));
    }
}
