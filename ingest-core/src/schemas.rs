//! Persisted document kinds and their content-derived identifiers.
//!
//! All documents are addressed by the SHA-256 of a canonical key string:
//!
//! - `repo:{repo_id}:{commit12}`
//! - `module:{repo_id}:{path}:{commit12}`
//! - `file:{repo_id}:{path}:{commit12}`
//! - `symbol:{repo_id}:{path}:{name}:{commit12}`
//!
//! Same key ⇒ same id, so upserts are idempotent and identifiers are stable
//! across runs at the same commit.

use code_indexer::{MethodRef, SymbolRef};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

pub const SCHEMA_VERSION: &str = "v4.0";

/// Level of LLM enrichment recorded on each document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentLevel {
    /// Full LLM-generated summary.
    LlmSummary,
    /// Fallback: docstring + structure only.
    Basic,
    /// No summary available.
    None,
}

/// Quality tracking for a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityInfo {
    pub enrichment_level: EnrichmentLevel,
    pub llm_available: bool,
    /// "llm_from_docstring_and_code", "aggregated_from_*", "docstring", "fallback".
    pub summary_source: String,
    /// Token estimate spent on this document.
    pub enrichment_cost: u32,
    pub is_underchunked: bool,
    pub underchunk_reason: String,
    /// Number of semantic chunks contributed by the LLM chunker.
    pub llm_chunks_added: u32,
}

impl Default for QualityInfo {
    fn default() -> Self {
        Self {
            enrichment_level: EnrichmentLevel::Basic,
            llm_available: true,
            summary_source: String::new(),
            enrichment_cost: 0,
            is_underchunked: false,
            underchunk_reason: String::new(),
            llm_chunks_added: 0,
        }
    }
}

/// Version tracking for a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub schema_version: String,
    pub pipeline_version: String,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl VersionInfo {
    /// Stamped with the current date/time.
    pub fn now() -> Self {
        let now = chrono::Utc::now();
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            pipeline_version: now.format("%Y.%m.%d").to_string(),
            created_at: now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            updated_at: None,
        }
    }
}

/* ===========================================================================
Identifier functions
======================================================================== */

fn hash_id(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// First 12 chars of the commit hash; short commits pass through.
pub fn commit12(commit: &str) -> &str {
    &commit[..commit.len().min(12)]
}

/// Folder path as stored on module documents: the repo root is `(root)`.
pub fn module_path_label(folder: &str) -> &str {
    if folder.is_empty() { "(root)" } else { folder }
}

pub fn repo_doc_id(repo_id: &str, commit: &str) -> String {
    hash_id(&format!("repo:{repo_id}:{}", commit12(commit)))
}

pub fn module_doc_id(repo_id: &str, folder: &str, commit: &str) -> String {
    hash_id(&format!(
        "module:{repo_id}:{}:{}",
        module_path_label(folder),
        commit12(commit)
    ))
}

pub fn file_doc_id(repo_id: &str, file_path: &str, commit: &str) -> String {
    hash_id(&format!("file:{repo_id}:{file_path}:{}", commit12(commit)))
}

pub fn symbol_doc_id(repo_id: &str, file_path: &str, symbol_name: &str, commit: &str) -> String {
    hash_id(&format!(
        "symbol:{repo_id}:{file_path}:{symbol_name}:{}",
        commit12(commit)
    ))
}

/// Documentation chunk id: `document::hash16(repo:path:index)`.
pub fn document_chunk_id(repo_id: &str, file_path: &str, index: usize) -> String {
    let digest = hash_id(&format!("{repo_id}:{file_path}:{index}"));
    format!("document::{}", &digest[..16])
}

/* ===========================================================================
Document kinds
======================================================================== */

/// One document per significant symbol.
#[derive(Debug, Clone)]
pub struct SymbolIndex {
    pub document_id: String,
    pub repo_id: String,
    pub file_path: String,
    pub commit_hash: String,
    pub symbol_name: String,
    pub symbol_type: String,
    pub language: String,
    /// Natural-language summary; the embedding source.
    pub content: String,
    pub embedding: Option<Vec<f32>>,
    pub start_line: u32,
    pub end_line: u32,
    pub docstring: Option<String>,
    pub methods: Vec<MethodRef>,
    pub inherits: Vec<String>,
    /// The owning file document.
    pub parent_id: String,
    pub quality: QualityInfo,
    pub version: VersionInfo,
    /// Code snippet used for embedding generation; not persisted.
    pub embedding_input: String,
}

impl SymbolIndex {
    pub fn to_value(&self) -> Value {
        json!({
            "document_id": self.document_id,
            "type": "symbol_index",
            "repo_id": self.repo_id,
            "file_path": self.file_path,
            "commit_hash": self.commit_hash,
            "symbol_name": self.symbol_name,
            "symbol_type": self.symbol_type,
            "language": self.language,
            "content": self.content,
            "embedding": self.embedding,
            "metadata": {
                "start_line": self.start_line,
                "end_line": self.end_line,
                "line_count": self.end_line - self.start_line + 1,
                "docstring": self.docstring,
                "methods": self.methods,
                "inherits": self.inherits,
            },
            "parent_id": self.parent_id,
            "quality": self.quality,
            "version": self.version,
        })
    }
}

/// One document per processed file. Lists ALL symbols; only significant
/// ones appear in `children_ids`.
#[derive(Debug, Clone)]
pub struct FileIndex {
    pub document_id: String,
    pub repo_id: String,
    pub file_path: String,
    pub commit_hash: String,
    pub content: String,
    pub embedding: Option<Vec<f32>>,
    pub line_count: u32,
    pub language: String,
    pub imports: Vec<String>,
    pub symbols: Vec<SymbolRef>,
    /// The owning module document (assigned during aggregation).
    pub parent_id: String,
    /// Symbol documents spawned from this file.
    pub children_ids: Vec<String>,
    pub quality: QualityInfo,
    pub version: VersionInfo,
    /// Summary + content preview used for embedding; not persisted.
    pub embedding_input: String,
}

fn symbol_meta(symbol: &SymbolRef) -> Value {
    json!({
        "name": symbol.name,
        "type": symbol.kind.as_str(),
        "lines": [symbol.start_line, symbol.end_line],
        "significant": symbol.is_significant(),
        "docstring": symbol.docstring,
        "methods": symbol.methods,
    })
}

impl FileIndex {
    pub fn to_value(&self) -> Value {
        json!({
            "document_id": self.document_id,
            "type": "file_index",
            "repo_id": self.repo_id,
            "file_path": self.file_path,
            "commit_hash": self.commit_hash,
            "content": self.content,
            "embedding": self.embedding,
            "metadata": {
                "line_count": self.line_count,
                "language": self.language,
                "imports": self.imports,
                "symbols": self.symbols.iter().map(symbol_meta).collect::<Vec<_>>(),
            },
            "parent_id": self.parent_id,
            "children_ids": self.children_ids,
            "quality": self.quality,
            "version": self.version,
        })
    }

    /// Rebuild the fields the aggregator needs from a stored document.
    /// Used when regenerating summaries from the store's current file set.
    pub fn from_stored(doc: &Value, commit_hash: &str) -> Option<Self> {
        let repo_id = doc.get("repo_id")?.as_str()?.to_string();
        let file_path = doc.get("file_path")?.as_str()?.to_string();
        let meta = doc.get("metadata");
        let content = doc
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Some(Self {
            document_id: file_doc_id(&repo_id, &file_path, commit_hash),
            repo_id,
            file_path,
            commit_hash: commit_hash.to_string(),
            content,
            embedding: None,
            line_count: meta
                .and_then(|m| m.get("line_count"))
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32,
            language: meta
                .and_then(|m| m.get("language"))
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            imports: meta
                .and_then(|m| m.get("imports"))
                .and_then(Value::as_array)
                .map(|a| {
                    a.iter()
                        .filter_map(Value::as_str)
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            symbols: Vec::new(),
            parent_id: String::new(),
            children_ids: Vec::new(),
            quality: QualityInfo::default(),
            version: VersionInfo::now(),
            embedding_input: String::new(),
        })
    }
}

/// One document per folder containing files or nested modules.
#[derive(Debug, Clone)]
pub struct ModuleSummary {
    pub document_id: String,
    pub repo_id: String,
    /// Folder path relative to the repo root; `(root)` for the root folder.
    pub module_path: String,
    pub commit_hash: String,
    pub content: String,
    pub embedding: Option<Vec<f32>>,
    pub file_count: u32,
    pub key_files: Vec<String>,
    /// Parent module or the repo document.
    pub parent_id: String,
    /// Direct files and immediate subfolder modules.
    pub children_ids: Vec<String>,
    pub quality: QualityInfo,
    pub version: VersionInfo,
}

impl ModuleSummary {
    pub fn to_value(&self) -> Value {
        json!({
            "document_id": self.document_id,
            "type": "module_summary",
            "repo_id": self.repo_id,
            "module_path": self.module_path,
            "commit_hash": self.commit_hash,
            "content": self.content,
            "embedding": self.embedding,
            "metadata": {
                "file_count": self.file_count,
                "key_files": self.key_files,
            },
            "parent_id": self.parent_id,
            "children_ids": self.children_ids,
            "quality": self.quality,
            "version": self.version,
        })
    }
}

/// Exactly one document per (repo, commit); top of the hierarchy.
#[derive(Debug, Clone)]
pub struct RepoSummary {
    pub document_id: String,
    pub repo_id: String,
    pub commit_hash: String,
    pub content: String,
    pub embedding: Option<Vec<f32>>,
    pub total_files: u32,
    pub total_lines: u64,
    /// `{language: file_count}`.
    pub languages: std::collections::BTreeMap<String, u32>,
    pub tech_stack: Vec<String>,
    /// Top-level module paths.
    pub modules: Vec<String>,
    pub children_ids: Vec<String>,
    pub quality: QualityInfo,
    pub version: VersionInfo,
}

impl RepoSummary {
    pub fn to_value(&self) -> Value {
        json!({
            "document_id": self.document_id,
            "type": "repo_summary",
            "repo_id": self.repo_id,
            "commit_hash": self.commit_hash,
            "content": self.content,
            "embedding": self.embedding,
            "metadata": {
                "total_files": self.total_files,
                "total_lines": self.total_lines,
                "languages": self.languages,
                "tech_stack": self.tech_stack,
                "modules": self.modules,
            },
            "children_ids": self.children_ids,
            "quality": self.quality,
            "version": self.version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_deterministic_and_distinct_per_kind() {
        let a = symbol_doc_id("acme/widget", "src/a.py", "f", "0123456789abcdef");
        let b = symbol_doc_id("acme/widget", "src/a.py", "f", "0123456789abcdef");
        assert_eq!(a, b);
        assert_ne!(a, file_doc_id("acme/widget", "src/a.py", "0123456789abcdef"));
        // Only the first 12 chars of the commit matter.
        assert_eq!(
            file_doc_id("r", "p", "0123456789abcdef"),
            file_doc_id("r", "p", "0123456789abFFFF")
        );
    }

    #[test]
    fn root_module_id_uses_root_label() {
        assert_eq!(
            module_doc_id("r", "", "c"),
            module_doc_id("r", "(root)", "c")
        );
    }

    #[test]
    fn document_chunk_id_shape() {
        let id = document_chunk_id("acme/widget", "README.md", 0);
        assert!(id.starts_with("document::"));
        assert_eq!(id.len(), "document::".len() + 16);
    }
}
