//! Per-file processing: content at commit → symbols → summaries →
//! `FileIndex` + significant `SymbolIndex` documents.
//!
//! Every step degrades gracefully: a missing structural parser falls back
//! to regex symbols, an open circuit breaker falls back to deterministic
//! summaries, and an unreadable or trivial file is skipped rather than
//! failing the repo.

use std::path::Path;
use std::sync::Arc;

use code_indexer::types::{SymbolKind, add_context_header, truncate_chunk_text};
use code_indexer::{CodeParser, Language, SymbolRef, imports::extract_imports, is_underchunked};
use git_engine::GitOps;
use llm_service::{LlmChunker, SemanticChunk, Summarizer};
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::quality::QualityTracker;
use crate::schemas::{
    EnrichmentLevel, FileIndex, QualityInfo, SymbolIndex, VersionInfo, file_doc_id, symbol_doc_id,
};

/// Minimum trimmed content length for a file to be worth indexing.
const MIN_CONTENT_CHARS: usize = 50;
/// Symbol snippet cap handed to the embedding input.
const MAX_SYMBOL_EMBED_CHARS: usize = 2_000;
/// File content preview cap in the embedding input.
const MAX_FILE_EMBED_CHARS: usize = 3_000;

/// Processes a single file into hierarchy documents.
pub struct FileProcessor {
    parser: Arc<CodeParser>,
    git: GitOps,
    summarizer: Option<Arc<Summarizer>>,
    chunker: Option<Arc<LlmChunker>>,
    quality: Arc<QualityTracker>,
}

impl FileProcessor {
    pub fn new(
        parser: Arc<CodeParser>,
        summarizer: Option<Arc<Summarizer>>,
        chunker: Option<Arc<LlmChunker>>,
        quality: Arc<QualityTracker>,
    ) -> Self {
        Self {
            parser,
            git: GitOps,
            summarizer,
            chunker,
            quality,
        }
    }

    /// Process one file at a specific commit.
    ///
    /// Returns `Ok(None)` when the file is skipped (unreadable, or trimmed
    /// content under 50 chars).
    pub async fn process(
        &self,
        file_path: &Path,
        repo_root: &Path,
        repo_id: &str,
        commit_hash: &str,
        parent_module_id: &str,
    ) -> Result<Option<(FileIndex, Vec<SymbolIndex>)>> {
        let relative_path = file_path
            .strip_prefix(repo_root)
            .unwrap_or(file_path)
            .to_string_lossy()
            .replace('\\', "/");

        let Some(content) = self
            .content_at_commit(repo_root, &relative_path, commit_hash)
            .await
        else {
            warn!(file = %relative_path, "skip: could not read file content");
            self.quality.record_file_skipped();
            return Ok(None);
        };
        if content.trim().len() < MIN_CONTENT_CHARS {
            debug!(file = %relative_path, "skip: file too small");
            self.quality.record_file_skipped();
            return Ok(None);
        }

        let language = Language::from_path(Path::new(&relative_path));
        let line_count = content.matches('\n').count() as u32 + 1;

        let mut symbols = self.parser.parse(language, &content, &relative_path);
        let imports = extract_imports(&content, language);

        let (underchunked, underchunk_reason) =
            is_underchunked(&relative_path, &content, symbols.len(), language);

        let mut llm_chunks_added = 0u32;
        if underchunked {
            if let Some(chunker) = self.chunker.as_ref().filter(|_| self.quality.llm_available()) {
                info!(
                    file = %relative_path,
                    reason = %underchunk_reason,
                    structural = symbols.len(),
                    "underchunked, invoking LLM chunker"
                );
                let existing: Vec<String> = symbols.iter().map(|s| s.name.clone()).collect();
                let chunks = chunker
                    .analyze_file(&relative_path, &content, language.as_str(), &existing)
                    .await;
                llm_chunks_added = chunks.len() as u32;
                for chunk in chunks {
                    symbols.push(semantic_chunk_to_symbol(chunk));
                }
                if llm_chunks_added > 0 {
                    info!(file = %relative_path, added = llm_chunks_added, "LLM chunker added semantic chunks");
                }
            }
        }

        // Per-symbol summaries and documents (significant symbols only).
        let lines: Vec<&str> = content.lines().collect();
        let file_id = file_doc_id(repo_id, &relative_path, commit_hash);
        let mut symbol_docs = Vec::new();
        let mut symbol_summaries = Vec::new();

        for symbol in &symbols {
            if !symbol.is_significant() {
                continue;
            }

            let container = match symbol.kind {
                SymbolKind::Method => symbol.name.split('.').next(),
                _ => None,
            };
            let raw = snippet(&lines, symbol.start_line, symbol.end_line);
            let chunk_text = add_context_header(
                &truncate_chunk_text(&raw, &format!("{relative_path}::{}", symbol.name)),
                &relative_path,
                container,
            );

            let (summary, enrichment) = self
                .symbol_summary(symbol, &chunk_text, &relative_path, language)
                .await;
            symbol_summaries.push(summary.clone());

            symbol_docs.push(SymbolIndex {
                document_id: symbol_doc_id(repo_id, &relative_path, &symbol.name, commit_hash),
                repo_id: repo_id.to_string(),
                file_path: relative_path.clone(),
                commit_hash: commit_hash.to_string(),
                symbol_name: symbol.name.clone(),
                symbol_type: symbol.kind.as_str().to_string(),
                language: language.as_str().to_string(),
                content: summary,
                embedding: None,
                start_line: symbol.start_line,
                end_line: symbol.end_line,
                docstring: symbol.docstring.clone(),
                methods: symbol.methods.clone(),
                inherits: Vec::new(),
                parent_id: file_id.clone(),
                quality: QualityInfo {
                    enrichment_level: enrichment,
                    llm_available: self.quality.llm_available(),
                    summary_source: match enrichment {
                        EnrichmentLevel::LlmSummary => "llm_from_docstring_and_code".into(),
                        _ => "docstring".into(),
                    },
                    ..QualityInfo::default()
                },
                version: VersionInfo::now(),
                embedding_input: clip(&chunk_text, MAX_SYMBOL_EMBED_CHARS).to_string(),
            });
            self.quality.record_symbol_processed();
        }

        // File-level summary from symbol summaries plus a content preview.
        let (file_summary, file_enrichment) = self
            .file_summary(&relative_path, &content, language, &symbols, &symbol_summaries)
            .await;

        let file_doc = FileIndex {
            document_id: file_id,
            repo_id: repo_id.to_string(),
            file_path: relative_path.clone(),
            commit_hash: commit_hash.to_string(),
            embedding: None,
            line_count,
            language: language.as_str().to_string(),
            imports,
            parent_id: parent_module_id.to_string(),
            children_ids: symbol_docs.iter().map(|s| s.document_id.clone()).collect(),
            quality: QualityInfo {
                enrichment_level: file_enrichment,
                llm_available: self.quality.llm_available(),
                summary_source: match file_enrichment {
                    EnrichmentLevel::LlmSummary => "llm_from_symbols".into(),
                    _ => "fallback".into(),
                },
                is_underchunked: underchunked,
                underchunk_reason: if underchunked {
                    underchunk_reason.clone()
                } else {
                    String::new()
                },
                llm_chunks_added,
                ..QualityInfo::default()
            },
            version: VersionInfo::now(),
            embedding_input: format!(
                "{file_summary}\n\nCode Preview:\n{}",
                clip(&content, MAX_FILE_EMBED_CHARS)
            ),
            content: file_summary,
            symbols,
        };

        self.quality.record_file_processed();
        info!(
            file = %relative_path,
            lines = line_count,
            language = language.as_str(),
            symbol_docs = symbol_docs.len(),
            llm_chunks = llm_chunks_added,
            "file processed"
        );

        Ok(Some((file_doc, symbol_docs)))
    }

    /// Content at the exact commit being indexed: `git show` with the full
    /// hash, then the 12-char short hash, then the working tree.
    async fn content_at_commit(
        &self,
        repo_root: &Path,
        relative_path: &str,
        commit_hash: &str,
    ) -> Option<String> {
        if !commit_hash.is_empty() && commit_hash != "unknown" {
            if let Some(content) = self
                .git
                .file_at_commit(repo_root, commit_hash, relative_path)
                .await
            {
                return Some(content);
            }
        }
        let full = repo_root.join(relative_path);
        std::fs::read(&full)
            .ok()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn symbol_summary(
        &self,
        symbol: &SymbolRef,
        chunk_text: &str,
        relative_path: &str,
        language: Language,
    ) -> (String, EnrichmentLevel) {
        if let Some(summarizer) = self.summarizer.as_ref().filter(|_| self.quality.llm_available()) {
            match summarizer
                .summarize_symbol(
                    &symbol.name,
                    symbol.kind.as_str(),
                    chunk_text,
                    relative_path,
                    language.as_str(),
                )
                .await
            {
                Ok(enrichment) => {
                    self.quality.record_llm_call(true, enrichment.tokens);
                    return (enrichment.summary, EnrichmentLevel::LlmSummary);
                }
                Err(e) => {
                    debug!(symbol = %symbol.name, error = %e, "LLM symbol summary failed");
                    self.quality.record_llm_call(false, 0);
                }
            }
        }
        (
            fallback_symbol_summary(symbol, relative_path),
            EnrichmentLevel::Basic,
        )
    }

    async fn file_summary(
        &self,
        relative_path: &str,
        content: &str,
        language: Language,
        symbols: &[SymbolRef],
        symbol_summaries: &[String],
    ) -> (String, EnrichmentLevel) {
        if let Some(summarizer) = self.summarizer.as_ref().filter(|_| self.quality.llm_available()) {
            let context: Vec<&str> = symbol_summaries
                .iter()
                .take(10)
                .map(String::as_str)
                .collect();
            match summarizer
                .summarize_file(relative_path, content, language.as_str(), &context.join("\n\n"))
                .await
            {
                Ok(enrichment) => {
                    self.quality.record_llm_call(true, enrichment.tokens);
                    return (enrichment.summary, EnrichmentLevel::LlmSummary);
                }
                Err(e) => {
                    debug!(file = relative_path, error = %e, "LLM file summary failed");
                    self.quality.record_llm_call(false, 0);
                }
            }
        }
        (
            fallback_file_summary(relative_path, symbols, language),
            EnrichmentLevel::Basic,
        )
    }
}

fn semantic_chunk_to_symbol(chunk: SemanticChunk) -> SymbolRef {
    SymbolRef {
        name: chunk.name,
        kind: SymbolKind::Semantic(chunk.chunk_type),
        start_line: chunk.start_line,
        end_line: chunk.end_line,
        docstring: if chunk.purpose.is_empty() {
            None
        } else {
            Some(chunk.purpose)
        },
        methods: vec![],
    }
}

/// `[start_line - 1, end_line)` slice of the file content.
fn snippet(lines: &[&str], start_line: u32, end_line: u32) -> String {
    let start = (start_line.max(1) as usize) - 1;
    let end = (end_line as usize).min(lines.len());
    if start >= end {
        return String::new();
    }
    lines[start..end].join("\n")
}

/// Deterministic summary used when the LLM path is unavailable.
fn fallback_symbol_summary(symbol: &SymbolRef, file_path: &str) -> String {
    let mut out = format!(
        "{} ({} in {}, lines {}-{})",
        symbol.name,
        symbol.kind.as_str(),
        file_path,
        symbol.start_line,
        symbol.end_line
    );

    if let Some(doc) = &symbol.docstring {
        let cleaned = clean_docstring(doc);
        if !cleaned.is_empty() {
            out.push_str("\n\n");
            out.push_str(clip(&cleaned, 300));
        }
    }

    if !symbol.methods.is_empty() {
        let names: Vec<&str> = symbol
            .methods
            .iter()
            .take(5)
            .map(|m| m.name.as_str())
            .collect();
        out.push_str(&format!("\n\nMethods: {}", names.join(", ")));
    }

    out
}

/// Structural file summary: classes, functions, and methods grouped.
fn fallback_file_summary(file_path: &str, symbols: &[SymbolRef], language: Language) -> String {
    let mut out = format!("File: {} ({})", file_path, language.as_str());

    let named = |kind: &SymbolKind| -> Vec<&str> {
        symbols
            .iter()
            .filter(|s| &s.kind == kind)
            .take(5)
            .map(|s| s.name.as_str())
            .collect()
    };

    let classes = named(&SymbolKind::Class);
    let functions = named(&SymbolKind::Function);
    let methods = named(&SymbolKind::Method);

    if !classes.is_empty() {
        out.push_str(&format!("\nClasses: {}", classes.join(", ")));
    }
    if !functions.is_empty() {
        out.push_str(&format!("\nFunctions: {}", functions.join(", ")));
    }
    if !methods.is_empty() && classes.is_empty() {
        out.push_str(&format!("\nMethods: {}", methods.join(", ")));
    }

    out
}

fn clean_docstring(doc: &str) -> String {
    doc.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .trim()
        .to_string()
}

/// Char-boundary-safe prefix clip.
pub(crate) fn clip(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use code_indexer::MethodRef;

    fn symbol(name: &str, kind: SymbolKind, start: u32, end: u32) -> SymbolRef {
        SymbolRef {
            name: name.into(),
            kind,
            start_line: start,
            end_line: end,
            docstring: None,
            methods: vec![],
        }
    }

    #[test]
    fn fallback_symbol_summary_format() {
        let mut sym = symbol("Widget", SymbolKind::Class, 3, 40);
        sym.docstring = Some("\"\"\"A widget that renders.\"\"\"".into());
        sym.methods = vec![
            MethodRef { name: "render".into(), lines: [5, 12] },
            MethodRef { name: "hide".into(), lines: [14, 18] },
        ];
        let out = fallback_symbol_summary(&sym, "src/widget.py");
        assert!(out.starts_with("Widget (class in src/widget.py, lines 3-40)"));
        assert!(out.contains("A widget that renders."));
        assert!(out.contains("Methods: render, hide"));
    }

    #[test]
    fn fallback_file_summary_groups_kinds() {
        let symbols = vec![
            symbol("Widget", SymbolKind::Class, 1, 30),
            symbol("main", SymbolKind::Function, 32, 40),
            symbol("Widget.render", SymbolKind::Method, 3, 10),
        ];
        let out = fallback_file_summary("src/widget.py", &symbols, Language::Python);
        assert!(out.contains("Classes: Widget"));
        assert!(out.contains("Functions: main"));
        // Methods are only listed when there are no classes.
        assert!(!out.contains("Methods:"));
    }

    #[test]
    fn snippet_is_inclusive_both_ends() {
        let content = "l1\nl2\nl3\nl4\nl5";
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(snippet(&lines, 2, 4), "l2\nl3\nl4");
        assert_eq!(snippet(&lines, 4, 99), "l4\nl5");
        assert_eq!(snippet(&lines, 9, 9), "");
    }
}
