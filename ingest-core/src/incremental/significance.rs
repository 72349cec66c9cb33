//! Significance gate: decides whether a file-level summary change warrants
//! regenerating ancestor (module/repo) summaries.
//!
//! Decision order: new file → identical summaries → gate disabled →
//! embedding cosine similarity → text heuristics. Thresholds are fields so
//! operators can tune them; the defaults are the documented values.

use doc_store::{DOC_PREFIX, EmbeddingProvider};
use tracing::{debug, info};

/// Keywords whose presence marks a change as significant.
const SIGNIFICANT_KEYWORDS: &[&str] = &[
    "new feature",
    "added",
    "implements",
    "creates",
    "api",
    "interface",
    "breaking",
    "refactor",
    "architecture",
    "dependency",
    "integration",
];

/// Keywords marking cosmetic, non-propagating changes.
const MINOR_KEYWORDS: &[&str] = &[
    "fix",
    "typo",
    "comment",
    "format",
    "style",
    "cleanup",
    "lint",
    "whitespace",
    "minor",
];

/// The gate with its tunable thresholds.
#[derive(Debug, Clone)]
pub struct SignificanceGate {
    pub enabled: bool,
    /// Cosine similarity above this ⇒ minor change.
    pub cosine_minor: f32,
    /// Cosine similarity below this ⇒ significant change.
    pub cosine_significant: f32,
    /// Text ratio at or above this ⇒ minor change.
    pub ratio_minor: f64,
    /// Text ratio below this ⇒ significant change.
    pub ratio_significant: f64,
}

impl Default for SignificanceGate {
    fn default() -> Self {
        Self {
            enabled: true,
            cosine_minor: 0.95,
            cosine_significant: 0.80,
            ratio_minor: 0.90,
            ratio_significant: 0.70,
        }
    }
}

impl SignificanceGate {
    /// Whether a summary change should propagate to parent summaries.
    pub async fn is_significant(
        &self,
        old_summary: &str,
        new_summary: &str,
        diff_text: &str,
        old_embedding: Option<&[f32]>,
        embedder: Option<&dyn EmbeddingProvider>,
    ) -> bool {
        // New file: always propagate.
        if old_summary.is_empty() {
            return true;
        }
        if old_summary.trim() == new_summary.trim() {
            debug!("summary unchanged, skipping propagation");
            return false;
        }
        // Disabled gate is conservative.
        if !self.enabled {
            return true;
        }

        if let (Some(old_vec), Some(embedder)) = (old_embedding, embedder) {
            if let Some(decision) = self.evaluate_embeddings(old_vec, new_summary, embedder).await {
                return decision;
            }
        }

        self.evaluate_heuristics(old_summary, new_summary, diff_text)
    }

    /// Cosine comparison of the old embedding against the new summary.
    /// `None` when the result is in the uncertain band or embedding fails.
    async fn evaluate_embeddings(
        &self,
        old_embedding: &[f32],
        new_summary: &str,
        embedder: &dyn EmbeddingProvider,
    ) -> Option<bool> {
        let new_embedding = match embedder.embed(&format!("{DOC_PREFIX}{new_summary}")).await {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "embedding comparison unavailable");
                return None;
            }
        };

        let similarity = cosine(old_embedding, &new_embedding);
        if similarity > self.cosine_minor {
            info!(similarity, "embedding similarity above minor threshold");
            return Some(false);
        }
        if similarity < self.cosine_significant {
            info!(similarity, "embedding similarity below significant threshold");
            return Some(true);
        }
        debug!(similarity, "embedding similarity uncertain, falling back to heuristics");
        None
    }

    fn evaluate_heuristics(&self, old_summary: &str, new_summary: &str, diff_text: &str) -> bool {
        let old_lower = old_summary.to_lowercase();
        let new_lower = new_summary.to_lowercase();

        let ratio = strsim::normalized_levenshtein(&old_lower, &new_lower);
        if ratio >= self.ratio_minor {
            info!(ratio, "summaries nearly identical, minor change");
            return false;
        }

        let summary_delta = new_lower.replace(&old_lower, "");
        let combined = format!("{} {}", diff_text.to_lowercase(), summary_delta.trim());

        let has_significant = SIGNIFICANT_KEYWORDS.iter().any(|kw| combined.contains(kw));
        let has_minor = MINOR_KEYWORDS.iter().any(|kw| combined.contains(kw));

        if has_minor && !has_significant {
            info!("minor change keywords only, stopping propagation");
            return false;
        }
        if has_significant {
            debug!("significant keywords detected, propagating");
            return true;
        }
        if ratio < self.ratio_significant {
            debug!(ratio, "summaries differ substantially, propagating");
            return true;
        }

        // Moderate changes propagate conservatively.
        debug!(ratio, "moderate change, propagating");
        true
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn decide(gate: &SignificanceGate, old: &str, new: &str, diff: &str) -> bool {
        gate.is_significant(old, new, diff, None, None).await
    }

    #[tokio::test]
    async fn new_file_is_significant() {
        let gate = SignificanceGate::default();
        assert!(decide(&gate, "", "brand new summary", "").await);
    }

    #[tokio::test]
    async fn identical_summary_is_not_significant() {
        let gate = SignificanceGate::default();
        assert!(!decide(&gate, "same text", "same text  ", "").await);
    }

    #[tokio::test]
    async fn disabled_gate_is_conservative() {
        let gate = SignificanceGate {
            enabled: false,
            ..SignificanceGate::default()
        };
        assert!(decide(&gate, "old summary", "slightly different", "").await);
    }

    #[tokio::test]
    async fn minor_keywords_stop_propagation() {
        let gate = SignificanceGate::default();
        let old = "Parses the configuration file and loads defaults for the whole application layer.";
        let new = "Reads the configuration file and loads all default values for the application.";
        assert!(!decide(&gate, old, new, "fix typo in comment").await);
    }

    #[tokio::test]
    async fn significant_keywords_propagate() {
        let gate = SignificanceGate::default();
        let old = "Parses the configuration file.";
        let new = "Parses the configuration file and exposes a new public interface for plugins.";
        assert!(decide(&gate, old, new, "implements plugin api").await);
    }

    #[tokio::test]
    async fn high_text_ratio_is_minor() {
        let gate = SignificanceGate::default();
        let old = "Handles user authentication and session management for the web app.";
        let new = "Handles user authentication and session management for the web apps.";
        assert!(!decide(&gate, old, new, "").await);
    }

    #[tokio::test]
    async fn embedding_band_decides_before_heuristics() {
        use doc_store::LocalEmbedder;
        let gate = SignificanceGate::default();
        let embedder = LocalEmbedder::new(128);
        let old_text = "completely different subject matter about databases";
        let old_vec = embedder
            .embed(&format!("{DOC_PREFIX}{old_text}"))
            .await
            .unwrap();
        // Unrelated new summary: cosine far below 0.80 → significant.
        let significant = gate
            .is_significant(
                old_text,
                "frontend rendering pipeline with widget layout",
                "",
                Some(&old_vec),
                Some(&embedder),
            )
            .await;
        assert!(significant);
    }
}
