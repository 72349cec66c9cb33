//! Underchunk detection: decides whether structural parsing likely missed
//! semantically important regions, which triggers the LLM chunker.
//!
//! Every matched reason is recorded verbatim for audit; multiple reasons are
//! joined with `"; "`.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::Language;

static LONG_TRIPLE_QUOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)"{3}.{200,}?"{3}"#).expect("valid regex"));
static SQL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)SELECT\s+.+FROM",
        r"(?i)INSERT\s+INTO",
        r"(?i)UPDATE\s+.+SET",
        r"(?i)DELETE\s+FROM",
        r"(?i)CREATE\s+TABLE",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});
static EMBEDDED_HTML: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<[a-z]+[^>]*>.{50,}?</[a-z]+>").expect("valid regex"));
static EMBEDDED_GRAPHQL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:mutation|query)\s*\{").expect("valid regex"));
static SQL_EXECUTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.execute\s*\(|\.query\s*\(|cursor\.|rawsql|text\s*\(").expect("valid regex")
});
static STRING_FORMATTING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\.format\s*\(|%\s*\(|f["']"#).expect("valid regex"));
static TEMPLATE_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`[^`]*\$\{[^}]+\}[^`]*`").expect("valid regex"));

const IMPORTANT_PATH_HINTS: &[&str] = &[
    "service",
    "handler",
    "controller",
    "manager",
    "helper",
    "util",
    "api",
    "view",
];

/// Detect whether a file is inadequately chunked.
///
/// Returns `(is_underchunked, reason)` where `reason` joins every matched
/// condition, or `"adequately_chunked"` when none hold.
pub fn is_underchunked(
    file_path: &str,
    content: &str,
    symbol_count: usize,
    language: Language,
) -> (bool, String) {
    let mut reasons: Vec<String> = Vec::new();

    let file_size = content.len();
    let lines = content.matches('\n').count() + 1;

    // Large file with almost no symbols is suspicious.
    if file_size > 5_000 && symbol_count < 2 {
        reasons.push(format!(
            "large_file_single_chunk ({file_size} chars, {symbol_count} symbols)"
        ));
    }

    if symbol_count > 0 {
        let lines_per_symbol = lines / symbol_count;
        if lines_per_symbol > 100 {
            reasons.push(format!("high_density ({lines_per_symbol} lines/symbol)"));
        }
    }

    if LONG_TRIPLE_QUOTE.is_match(content) {
        reasons.push("long_docstring_or_sql".to_string());
    }
    if SQL_PATTERNS.iter().any(|re| re.is_match(content)) {
        reasons.push("embedded_sql".to_string());
    }
    if EMBEDDED_HTML.is_match(content) {
        reasons.push("embedded_html".to_string());
    }
    if EMBEDDED_GRAPHQL.is_match(content) {
        reasons.push("embedded_graphql".to_string());
    }

    if language == Language::Python {
        if SQL_EXECUTION.is_match(content) && !reasons.iter().any(|r| r == "embedded_sql") {
            reasons.push("sql_execution_pattern".to_string());
        }
        let format_count = STRING_FORMATTING.find_iter(content).count();
        if format_count > 5 {
            reasons.push(format!("heavy_string_formatting ({format_count} instances)"));
        }
    }

    if matches!(language, Language::Javascript | Language::Typescript) {
        let template_literals = TEMPLATE_LITERAL.find_iter(content).count();
        if template_literals > 3 {
            reasons.push(format!("template_literals ({template_literals} instances)"));
        }
    }

    if matches!(
        language,
        Language::Sql | Language::Svelte | Language::Vue | Language::Unknown
    ) && symbol_count <= 2
    {
        reasons.push(format!(
            "unsupported_language_minimal_chunks ({})",
            language.as_str()
        ));
    }

    let path_lower = file_path.to_lowercase();
    if IMPORTANT_PATH_HINTS.iter().any(|p| path_lower.contains(p)) && symbol_count <= 2 {
        reasons.push("important_file_minimal_chunks".to_string());
    }

    if reasons.is_empty() {
        (false, "adequately_chunked".to_string())
    } else {
        (true, reasons.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_well_chunked_file_passes() {
        let (under, reason) = is_underchunked("src/lib.py", "def f():\n    pass\n", 3, Language::Python);
        assert!(!under);
        assert_eq!(reason, "adequately_chunked");
    }

    #[test]
    fn large_file_with_one_symbol() {
        let content = "x = 1\n".repeat(1_000);
        let (under, reason) = is_underchunked("src/big.py", &content, 1, Language::Python);
        assert!(under);
        assert!(reason.contains("large_file_single_chunk"));
    }

    #[test]
    fn embedded_sql_detected() {
        let content = "q = 'SELECT id, name FROM users WHERE x = 1'\n".repeat(3);
        let (under, reason) = is_underchunked("src/db.py", &content, 5, Language::Python);
        assert!(under);
        assert!(reason.contains("embedded_sql"));
        // sql_execution_pattern is suppressed when embedded_sql already matched
        assert!(!reason.contains("sql_execution_pattern"));
    }

    #[test]
    fn important_path_with_few_symbols() {
        let (under, reason) =
            is_underchunked("app/services/billing.py", "pass\n", 1, Language::Python);
        assert!(under);
        assert!(reason.contains("important_file_minimal_chunks"));
    }

    #[test]
    fn template_literals_js_only() {
        let content = "const a = `v ${x}`;\nconst b = `w ${y}`;\nconst c = `z ${q}`;\nconst d = `u ${r}`;\n";
        let (under, reason) = is_underchunked("src/gen.ts", content, 8, Language::Typescript);
        assert!(under);
        assert!(reason.contains("template_literals"));
        let (under_py, _) = is_underchunked("src/gen.py", content, 8, Language::Python);
        assert!(!under_py);
    }

    #[test]
    fn unknown_language_minimal_symbols() {
        let (under, reason) = is_underchunked("schema.sql", "-- ddl\n", 0, Language::Sql);
        assert!(under);
        assert!(reason.contains("unsupported_language_minimal_chunks (sql)"));
    }
}
