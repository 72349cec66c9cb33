//! Regex-based providers: the fallback parser used when a structural parser
//! is unavailable or fails, plus the lightweight HTML/CSS section parsers.
//!
//! Fallback symbols have correct names and approximate line ranges (a
//! definition runs until the next definition of the same shape).

use std::sync::LazyLock;

use regex::Regex;

use crate::ast::interface::AstProvider;
use crate::errors::Result;
use crate::types::{Language, SymbolKind, SymbolRef};

static PY_DEF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^def\s+([a-zA-Z_][a-zA-Z0-9_]*)\s*\(").expect("valid regex"));
static PY_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^class\s+([a-zA-Z_][a-zA-Z0-9_]*)\s*[:\(]").expect("valid regex")
});
static JS_FUNC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)function\s+([a-zA-Z_$][a-zA-Z0-9_$]*)\s*\(").expect("valid regex")
});
static JS_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*class\s+([a-zA-Z_$][a-zA-Z0-9_$]*)").expect("valid regex")
});
static JS_EXPORT_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)export\s+(?:const|let|var)\s+([a-zA-Z_$][a-zA-Z0-9_$]*)\s*=")
        .expect("valid regex")
});
static CSS_RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^([^@{}\s][^{]*)\{").expect("valid regex"));
static HTML_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<([a-zA-Z][a-zA-Z0-9-]*)[^>]*\bid\s*=\s*["']([^"']+)["']"#)
        .expect("valid regex")
});

/// Fallback provider producing named function/class symbols for languages
/// whose structural parser is unavailable.
pub struct RegexFallback {
    language: Language,
}

impl RegexFallback {
    pub fn new(language: Language) -> Self {
        Self { language }
    }
}

impl AstProvider for RegexFallback {
    fn parse(&self, content: &str) -> Result<Vec<SymbolRef>> {
        let mut symbols = Vec::new();
        match self.language {
            Language::Python => {
                collect(content, &PY_DEF, SymbolKind::Function, &mut symbols);
                collect(content, &PY_CLASS, SymbolKind::Class, &mut symbols);
            }
            Language::Javascript | Language::Typescript => {
                collect(content, &JS_FUNC, SymbolKind::Function, &mut symbols);
                collect(content, &JS_CLASS, SymbolKind::Class, &mut symbols);
                collect(content, &JS_EXPORT_VAR, SymbolKind::Variable, &mut symbols);
            }
            _ => {}
        }
        symbols.sort_by_key(|s| s.start_line);
        Ok(symbols)
    }
}

/// Each match runs until the next match of the same pattern (or EOF).
fn collect(content: &str, pattern: &Regex, kind: SymbolKind, out: &mut Vec<SymbolRef>) {
    let matches: Vec<(usize, String)> = pattern
        .captures_iter(content)
        .filter_map(|c| {
            let m = c.get(0)?;
            Some((m.start(), c.get(1)?.as_str().to_string()))
        })
        .collect();

    for (i, (start, name)) in matches.iter().enumerate() {
        let end = matches
            .get(i + 1)
            .map_or(content.len(), |(next, _)| *next);
        out.push(SymbolRef {
            name: name.clone(),
            kind: kind.clone(),
            start_line: line_at(content, *start),
            end_line: line_at(content, end.saturating_sub(1)),
            docstring: None,
            methods: vec![],
        });
    }
}

/// CSS provider: one symbol per top-level rule, named after the selector.
pub struct CssAst;

impl AstProvider for CssAst {
    fn parse(&self, content: &str) -> Result<Vec<SymbolRef>> {
        let mut symbols = Vec::new();
        for cap in CSS_RULE.captures_iter(content) {
            let whole = cap.get(0).expect("match 0");
            let selector = cap[1].trim().to_string();
            if selector.is_empty() {
                continue;
            }
            let end = content[whole.end()..]
                .find('}')
                .map_or(content.len(), |off| whole.end() + off);
            symbols.push(SymbolRef {
                name: selector,
                kind: SymbolKind::Variable,
                start_line: line_at(content, whole.start()),
                end_line: line_at(content, end),
                docstring: None,
                methods: vec![],
            });
        }
        Ok(symbols)
    }
}

/// HTML provider: one symbol per element carrying an `id` attribute.
pub struct HtmlAst;

impl AstProvider for HtmlAst {
    fn parse(&self, content: &str) -> Result<Vec<SymbolRef>> {
        let mut symbols = Vec::new();
        for cap in HTML_ID.captures_iter(content) {
            let whole = cap.get(0).expect("match 0");
            symbols.push(SymbolRef {
                name: cap[2].to_string(),
                kind: SymbolKind::Variable,
                start_line: line_at(content, whole.start()),
                end_line: line_at(content, whole.end()),
                docstring: None,
                methods: vec![],
            });
        }
        Ok(symbols)
    }
}

/// 1-based line of a byte offset, clamped to a char boundary.
fn line_at(content: &str, byte: usize) -> u32 {
    let mut byte = byte.min(content.len());
    while !content.is_char_boundary(byte) {
        byte -= 1;
    }
    content[..byte].matches('\n').count() as u32 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_fallback_names_and_ranges() {
        let src = "def one():\n    pass\n\ndef two():\n    pass\n\nclass Thing:\n    pass\n";
        let symbols = RegexFallback::new(Language::Python).parse(src).unwrap();
        let one = symbols.iter().find(|s| s.name == "one").unwrap();
        assert_eq!(one.kind, SymbolKind::Function);
        assert_eq!(one.start_line, 1);
        assert!(one.end_line < 4);
        assert!(symbols.iter().any(|s| s.name == "Thing" && s.kind == SymbolKind::Class));
    }

    #[test]
    fn js_fallback_finds_exported_consts() {
        let src = "export const Widget = () => {\n  render();\n};\nfunction helper() {}\n";
        let symbols = RegexFallback::new(Language::Javascript).parse(src).unwrap();
        assert!(symbols.iter().any(|s| s.name == "Widget" && s.kind == SymbolKind::Variable));
        assert!(symbols.iter().any(|s| s.name == "helper"));
    }

    #[test]
    fn css_rules_named_by_selector() {
        let src = ".card {\n  color: red;\n}\n#main {\n  margin: 0;\n}\n";
        let symbols = CssAst.parse(src).unwrap();
        let names: Vec<&str> = symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec![".card", "#main"]);
    }

    #[test]
    fn html_elements_with_ids() {
        let src = "<div id=\"app\">\n<span id='badge'>x</span>\n</div>\n";
        let symbols = HtmlAst.parse(src).unwrap();
        let names: Vec<&str> = symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["app", "badge"]);
    }
}
