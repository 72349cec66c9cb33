//! Svelte provider: regex split of the component into script / style /
//! template sections. The script body is delegated to the JS/TS provider
//! with its symbol line numbers offset back into the full file, so snippet
//! slicing against the original content stays correct.

use std::sync::LazyLock;

use regex::Regex;

use crate::ast::interface::AstProvider;
use crate::ast::javascript::JavascriptAst;
use crate::errors::Result;
use crate::types::{SymbolKind, SymbolRef};

static SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<script[^>]*>(.*?)</script>").expect("valid regex")
});
static STYLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<style[^>]*>(.*?)</style>").expect("valid regex"));

pub struct SvelteAst;

impl AstProvider for SvelteAst {
    fn parse(&self, content: &str) -> Result<Vec<SymbolRef>> {
        let mut symbols = Vec::new();

        if let Some(cap) = SCRIPT.captures(content) {
            let whole = cap.get(0).expect("match 0");
            let body = cap.get(1).expect("group 1");
            let is_typescript =
                whole.as_str().contains("lang=\"ts\"") || whole.as_str().contains("lang='ts'");
            let line_offset = line_of(content, body.start());

            match JavascriptAst::new(is_typescript).parse(body.as_str()) {
                Ok(script_symbols) if !script_symbols.is_empty() => {
                    for mut sym in script_symbols {
                        sym.start_line += line_offset;
                        sym.end_line += line_offset;
                        for m in &mut sym.methods {
                            m.lines[0] += line_offset;
                            m.lines[1] += line_offset;
                        }
                        symbols.push(sym);
                    }
                }
                _ => {
                    // One symbol covering the whole script section.
                    symbols.push(section_symbol(
                        "script",
                        SymbolKind::SvelteScript,
                        content,
                        whole.start(),
                        whole.end(),
                    ));
                }
            }
        }

        if let Some(cap) = STYLE.captures(content) {
            let whole = cap.get(0).expect("match 0");
            symbols.push(section_symbol(
                "style",
                SymbolKind::SvelteStyle,
                content,
                whole.start(),
                whole.end(),
            ));
        }

        // Template = everything outside script/style. Report it as one
        // symbol spanning the file when any markup remains.
        let without_script = SCRIPT.replace_all(content, "");
        let without = STYLE.replace_all(&without_script, "");
        if !without.trim().is_empty() {
            symbols.push(SymbolRef {
                name: "template".to_string(),
                kind: SymbolKind::SvelteTemplate,
                start_line: 1,
                end_line: content.matches('\n').count() as u32 + 1,
                docstring: None,
                methods: vec![],
            });
        }

        Ok(symbols)
    }
}

fn section_symbol(
    name: &str,
    kind: SymbolKind,
    content: &str,
    start_byte: usize,
    end_byte: usize,
) -> SymbolRef {
    SymbolRef {
        name: name.to_string(),
        kind,
        start_line: line_of(content, start_byte) + 1,
        end_line: line_of(content, end_byte.saturating_sub(1)) + 1,
        docstring: None,
        methods: vec![],
    }
}

/// 0-based line index of a byte offset, clamped to a char boundary.
fn line_of(content: &str, byte: usize) -> u32 {
    let mut byte = byte.min(content.len());
    while !content.is_char_boundary(byte) {
        byte -= 1;
    }
    content[..byte].matches('\n').count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: &str = "<script>\nfunction toggle() {\n  open = !open;\n  emit();\n  redraw();\n}\n</script>\n\n<div>{open}</div>\n\n<style>\n.open { color: red; }\n</style>\n";

    #[test]
    fn splits_sections_and_offsets_script_lines() {
        let symbols = SvelteAst.parse(SRC).expect("parse ok");
        let toggle = symbols.iter().find(|s| s.name == "toggle").unwrap();
        // `function toggle()` sits on line 2 of the full file.
        assert_eq!(toggle.start_line, 2);
        assert_eq!(toggle.end_line, 6);

        assert!(symbols.iter().any(|s| s.kind == SymbolKind::SvelteStyle));
        assert!(symbols.iter().any(|s| s.kind == SymbolKind::SvelteTemplate));
    }
}
