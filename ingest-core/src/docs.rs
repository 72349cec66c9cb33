//! Supplementary documentation pipeline: chunks .md/.rst/.txt files with a
//! semantic splitter and stores embedded `document` chunks.
//!
//! Chunks target ~4000 characters; anything whose trimmed content is under
//! 100 characters is dropped. Markdown chunks carry their section title and
//! a breadcrumb of ancestor headings.

use std::path::Path;
use std::sync::Arc;
use std::sync::LazyLock;

use doc_store::{DOC_PREFIX, DocumentStore, EmbeddingProvider};
use regex::Regex;
use serde_json::json;
use tracing::{debug, info, warn};
use text_splitter::{MarkdownSplitter, TextSplitter};

use crate::errors::Result;
use crate::schemas::document_chunk_id;

/// Target chunk capacity in characters.
const CHUNK_CAPACITY: usize = 4_000;
/// Chunks with less trimmed content than this are dropped.
const MIN_CHUNK_CHARS: usize = 100;

static HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(#{1,6})\s+(.+)$").expect("valid regex"));

/// Ingests documentation files for a repository.
pub struct DocumentIngester {
    store: Arc<dyn DocumentStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    dry_run: bool,
}

impl DocumentIngester {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        dry_run: bool,
    ) -> Self {
        Self {
            store,
            embedder,
            dry_run,
        }
    }

    /// Process a single documentation file. Returns chunks created.
    pub async fn process_doc(
        &self,
        file_path: &Path,
        repo_root: &Path,
        repo_id: &str,
    ) -> Result<usize> {
        let relative = file_path
            .strip_prefix(repo_root)
            .unwrap_or(file_path)
            .to_string_lossy()
            .replace('\\', "/");

        let content = match std::fs::read(file_path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                warn!(file = %relative, error = %e, "could not read doc file");
                return Ok(0);
            }
        };
        if content.trim().len() < MIN_CHUNK_CHARS {
            debug!(file = %relative, "skipping tiny doc file");
            return Ok(0);
        }

        let ext = file_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        let (doc_type, chunks) = split(&ext, &content);

        let chunks: Vec<&str> = chunks
            .into_iter()
            .filter(|c| c.trim().len() >= MIN_CHUNK_CHARS)
            .collect();
        if chunks.is_empty() {
            debug!(file = %relative, "all chunks below minimum size");
            return Ok(0);
        }

        if self.dry_run {
            info!(file = %relative, chunks = chunks.len(), "[dry run] would store doc chunks");
            return Ok(chunks.len());
        }

        let total = chunks.len();
        for (idx, chunk) in chunks.iter().enumerate() {
            let doc_id = document_chunk_id(repo_id, &relative, idx);
            let hierarchy = if doc_type == "plaintext" {
                Hierarchy::default()
            } else {
                header_hierarchy(chunk, &content)
            };

            let embedding = self
                .embedder
                .embed(&format!("{DOC_PREFIX}{chunk}"))
                .await?;

            let record = json!({
                "document_id": doc_id,
                "type": "document",
                "repo_id": repo_id,
                "file_path": relative,
                "doc_type": doc_type,
                "content": chunk,
                "chunk_index": idx,
                "total_chunks": total,
                "section_title": hierarchy.section_title,
                "header_path": hierarchy.header_path,
                "header_level": hierarchy.header_level,
                "embedding": embedding,
                "created_at": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            });
            self.store.upsert(&doc_id, &record).await?;
        }

        debug!(file = %relative, chunks = total, "doc file ingested");
        Ok(total)
    }
}

fn split<'a>(ext: &str, content: &'a str) -> (&'static str, Vec<&'a str>) {
    match ext {
        "md" => (
            "markdown",
            MarkdownSplitter::new(CHUNK_CAPACITY).chunks(content).collect(),
        ),
        // RST is close enough to markdown for the splitter's purposes.
        "rst" => (
            "restructuredtext",
            MarkdownSplitter::new(CHUNK_CAPACITY).chunks(content).collect(),
        ),
        _ => (
            "plaintext",
            TextSplitter::new(CHUNK_CAPACITY).chunks(content).collect(),
        ),
    }
}

#[derive(Debug, Default)]
struct Hierarchy {
    section_title: Option<String>,
    header_path: Option<String>,
    header_level: Option<u8>,
}

/// Builds the heading breadcrumb for a markdown chunk: the most recent
/// heading at each level above the chunk's first heading, joined with `>`.
fn header_hierarchy(chunk: &str, full_doc: &str) -> Hierarchy {
    let Some(cap) = HEADER.captures(chunk) else {
        return Hierarchy::default();
    };
    let header_level = cap[1].len() as u8;
    let section_title = cap[2].trim().to_string();

    // Approximate chunk position in the full document.
    let probe: String = chunk.chars().take(100).collect();
    let Some(chunk_start) = full_doc.find(&probe) else {
        return Hierarchy {
            header_path: Some(section_title.clone()),
            section_title: Some(section_title),
            header_level: Some(header_level),
        };
    };

    let mut hierarchy: std::collections::BTreeMap<u8, String> = std::collections::BTreeMap::new();
    for cap in HEADER.captures_iter(&full_doc[..chunk_start]) {
        let level = cap[1].len() as u8;
        hierarchy.insert(level, cap[2].trim().to_string());
        // A new heading invalidates everything nested deeper.
        hierarchy.retain(|&l, _| l <= level);
    }
    hierarchy.insert(header_level, section_title.clone());
    hierarchy.retain(|&l, _| l <= header_level);

    let path_parts: Vec<&str> = hierarchy.values().map(String::as_str).collect();
    Hierarchy {
        header_path: Some(path_parts.join(" > ")),
        section_title: Some(section_title),
        header_level: Some(header_level),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breadcrumb_tracks_most_recent_heading_per_level() {
        let doc = "# Title\n\n## One\n\ntext\n\n## Two\n\n### Deep\n\nmore text here\n";
        let chunk = "### Deep\n\nmore text here\n";
        let h = header_hierarchy(chunk, doc);
        assert_eq!(h.section_title.as_deref(), Some("Deep"));
        assert_eq!(h.header_path.as_deref(), Some("Title > Two > Deep"));
        assert_eq!(h.header_level, Some(3));
    }

    #[test]
    fn chunk_without_heading_has_no_hierarchy() {
        let h = header_hierarchy("plain paragraph", "# T\n\nplain paragraph");
        assert!(h.section_title.is_none());
        assert!(h.header_path.is_none());
    }

    #[tokio::test]
    async fn drops_chunks_under_minimum() {
        use doc_store::{LocalEmbedder, MemoryStore};
        let store = Arc::new(MemoryStore::new());
        let embedder = Arc::new(LocalEmbedder::new(32));
        let ingester = DocumentIngester::new(store.clone(), embedder, false);

        let dir = tempfile::tempdir().expect("tempdir");
        let body = format!("# Guide\n\n{}\n", "A real paragraph with plenty of content. ".repeat(10));
        let path = dir.path().join("README.md");
        std::fs::write(&path, &body).unwrap();

        let created = ingester
            .process_doc(&path, dir.path(), "acme/widget")
            .await
            .unwrap();
        assert!(created >= 1);
        for doc in store.all() {
            let content = doc.get("content").and_then(|v| v.as_str()).unwrap();
            assert!(content.trim().len() >= 100);
        }
    }
}
