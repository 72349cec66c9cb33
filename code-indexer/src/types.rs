//! Language-agnostic symbol schema shared by the parsers and the pipeline.
//!
//! Conventions:
//! - `serde(rename_all = "snake_case")` for enums to keep serialized forms stable.
//! - Line numbers are 1-indexed and inclusive on both ends.

use serde::{Deserialize, Serialize};

/// Symbols spanning at least this many lines become their own documents.
pub const SYMBOL_MIN_LINES: u32 = 5;

/// Max chunk text size before truncation (chars). Stays within the embedding
/// model's 8192-token limit at ~0.75 tokens per char.
pub const MAX_CHUNK_SIZE: usize = 6_000;

/// Language discriminator for parsed files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Python,
    Javascript,
    Typescript,
    Svelte,
    Vue,
    Html,
    Css,
    Sql,
    Unknown,
}

impl Language {
    /// Detect language from a file extension.
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "py" => Self::Python,
            "js" | "jsx" => Self::Javascript,
            "ts" | "tsx" => Self::Typescript,
            "svelte" => Self::Svelte,
            "vue" => Self::Vue,
            "html" => Self::Html,
            "css" | "scss" | "sass" => Self::Css,
            "sql" => Self::Sql,
            _ => Self::Unknown,
        }
    }

    pub fn from_path(path: &std::path::Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map_or(Self::Unknown, Self::from_extension)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Javascript => "javascript",
            Self::Typescript => "typescript",
            Self::Svelte => "svelte",
            Self::Vue => "vue",
            Self::Html => "html",
            Self::Css => "css",
            Self::Sql => "sql",
            Self::Unknown => "unknown",
        }
    }
}

/// Symbol kind taxonomy. Structural kinds are closed; chunker-discovered
/// kinds carry their reported type string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Class,
    Method,
    ArrowFunction,
    Variable,
    SvelteScript,
    SvelteStyle,
    SvelteTemplate,
    #[serde(untagged)]
    Semantic(String),
}

impl SymbolKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Method => "method",
            Self::ArrowFunction => "arrow_function",
            Self::Variable => "variable",
            Self::SvelteScript => "svelte_script",
            Self::SvelteStyle => "svelte_style",
            Self::SvelteTemplate => "svelte_template",
            Self::Semantic(s) => s,
        }
    }

    /// True for kinds produced by structural parsing (as opposed to the
    /// LLM chunker).
    pub fn is_structural(&self) -> bool {
        !matches!(self, Self::Semantic(_))
    }
}

/// A method entry on a class symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodRef {
    pub name: String,
    /// `[start_line, end_line]`, 1-indexed inclusive.
    pub lines: [u32; 2],
}

/// Reference to a symbol within a file.
///
/// ALL symbols are listed in the file document's metadata; only significant
/// ones (>= [`SYMBOL_MIN_LINES`]) become their own symbol documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolRef {
    pub name: String,
    pub kind: SymbolKind,
    pub start_line: u32,
    pub end_line: u32,
    pub docstring: Option<String>,
    /// For classes: methods with their line ranges.
    #[serde(default)]
    pub methods: Vec<MethodRef>,
}

impl SymbolRef {
    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    /// Significant symbols get their own index document.
    pub fn is_significant(&self) -> bool {
        self.line_count() >= SYMBOL_MIN_LINES
    }
}

/// Prepend the two-line context header used on every chunk text that feeds
/// embedding or summarization.
pub fn add_context_header(code_text: &str, relative_path: &str, container: Option<&str>) -> String {
    let mut out = format!("# Context: {relative_path}\n");
    if let Some(name) = container {
        out.push_str(&format!("# Inside: {name}\n"));
    }
    out.push_str(code_text);
    out
}

/// Truncate oversized chunk text, keeping the beginning and end for context
/// with an explicit marker in between.
pub fn truncate_chunk_text(text: &str, context: &str) -> String {
    if text.len() <= MAX_CHUNK_SIZE {
        return text.to_string();
    }

    const KEEP_START: usize = 4_500;
    const KEEP_END: usize = 1_400;
    let removed = text.len() - KEEP_START - KEEP_END;

    tracing::warn!(
        original = text.len(),
        removed,
        context,
        "truncating oversized chunk"
    );

    let mut start_end = KEEP_START;
    while !text.is_char_boundary(start_end) {
        start_end -= 1;
    }
    let mut tail_start = text.len() - KEEP_END;
    while !text.is_char_boundary(tail_start) {
        tail_start += 1;
    }

    format!(
        "{}\n... [truncated {removed} chars] ...\n{}",
        &text[..start_end],
        &text[tail_start..]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn significance_is_five_lines_inclusive() {
        let mut sym = SymbolRef {
            name: "f".into(),
            kind: SymbolKind::Function,
            start_line: 10,
            end_line: 14,
            docstring: None,
            methods: vec![],
        };
        assert_eq!(sym.line_count(), 5);
        assert!(sym.is_significant());
        sym.end_line = 13;
        assert!(!sym.is_significant());
    }

    #[test]
    fn semantic_kind_serializes_as_raw_string() {
        let k = SymbolKind::Semantic("embedded_sql".into());
        assert_eq!(serde_json::to_value(&k).unwrap(), "embedded_sql");
        let back: SymbolKind = serde_json::from_value("embedded_sql".into()).unwrap();
        assert_eq!(back, k);
        let f: SymbolKind = serde_json::from_value("function".into()).unwrap();
        assert_eq!(f, SymbolKind::Function);
    }

    #[test]
    fn truncation_keeps_head_tail_and_marker() {
        let text = "x".repeat(10_000);
        let out = truncate_chunk_text(&text, "test");
        assert!(out.contains("... [truncated 4100 chars] ..."));
        assert!(out.len() < text.len());
    }

    #[test]
    fn context_header_includes_container() {
        let out = add_context_header("code", "src/a.py", Some("Widget"));
        assert!(out.starts_with("# Context: src/a.py\n# Inside: Widget\ncode"));
    }
}
