//! Python AST provider backed by tree-sitter.
//!
//! Extracts bare top-level functions and classes. Class symbols span the
//! full class body and carry a `methods[]` list; each method is also
//! emitted as its own `Class.method` symbol so significant methods become
//! documents. Decorated definitions are not extracted.

use tree_sitter::{Node, Parser};

use crate::ast::interface::AstProvider;
use crate::errors::{Error, Result};
use crate::types::{MethodRef, SymbolKind, SymbolRef};

pub struct PythonAst;

impl AstProvider for PythonAst {
    fn parse(&self, content: &str) -> Result<Vec<SymbolRef>> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|_| Error::TreeSitterLanguage)?;
        let tree = parser.parse(content, None).ok_or(Error::TreeSitterParse)?;
        let root = tree.root_node();
        let src = content.as_bytes();

        let mut symbols = Vec::new();
        let mut cursor = root.walk();
        // Only bare definitions; decorated definitions are not descended
        // into (`async def` still parses as a plain function_definition).
        for node in root.children(&mut cursor) {
            match node.kind() {
                "function_definition" => {
                    symbols.push(function_symbol(node, src, None));
                }
                "class_definition" => {
                    extract_class(node, src, &mut symbols);
                }
                _ => {}
            }
        }
        Ok(symbols)
    }
}

fn extract_class(node: Node<'_>, src: &[u8], symbols: &mut Vec<SymbolRef>) {
    let class_name = field_text(node, "name", src);

    let mut methods = Vec::new();
    let mut method_symbols = Vec::new();

    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for def in body.children(&mut cursor) {
            if def.kind() != "function_definition" {
                continue;
            }

            let method_name = field_text(def, "name", src);
            let (start, end) = line_span(def);
            methods.push(MethodRef {
                name: method_name.clone(),
                lines: [start, end],
            });
            let mut sym = function_symbol(def, src, Some(class_name.as_str()));
            sym.kind = SymbolKind::Method;
            method_symbols.push(sym);
        }
    }

    let (start, end) = line_span(node);
    symbols.push(SymbolRef {
        name: class_name,
        kind: SymbolKind::Class,
        start_line: start,
        end_line: end,
        docstring: body_docstring(node, src),
        methods,
    });
    symbols.extend(method_symbols);
}

fn function_symbol(node: Node<'_>, src: &[u8], class_name: Option<&str>) -> SymbolRef {
    let bare = field_text(node, "name", src);
    let name = match class_name {
        Some(class) => format!("{class}.{bare}"),
        None => bare,
    };
    let (start, end) = line_span(node);
    SymbolRef {
        name,
        kind: SymbolKind::Function,
        start_line: start,
        end_line: end,
        docstring: body_docstring(node, src),
        methods: vec![],
    }
}

/// First statement of the body, when it is a string expression.
fn body_docstring(node: Node<'_>, src: &[u8]) -> Option<String> {
    let body = node.child_by_field_name("body")?;
    let mut cursor = body.walk();
    let first = body.named_children(&mut cursor).next()?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let expr = first.named_child(0)?;
    if expr.kind() == "string" {
        expr.utf8_text(src).ok().map(str::to_string)
    } else {
        None
    }
}

fn field_text(node: Node<'_>, field: &str, src: &[u8]) -> String {
    node.child_by_field_name(field)
        .and_then(|n| n.utf8_text(src).ok())
        .unwrap_or("unknown")
        .to_string()
}

fn line_span(node: Node<'_>) -> (u32, u32) {
    (
        node.start_position().row as u32 + 1,
        node.end_position().row as u32 + 1,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: &str = r#"import os

def top(a, b):
    """Adds things."""
    x = a + b
    y = x * 2
    return y

class Widget:
    """A widget."""

    def render(self):
        """Render it."""
        line1 = 1
        line2 = 2
        return line1 + line2

    def hide(self):
        pass
"#;

    #[test]
    fn extracts_functions_classes_and_methods() {
        let symbols = PythonAst.parse(SRC).expect("parse ok");
        let names: Vec<&str> = symbols.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"top"));
        assert!(names.contains(&"Widget"));
        assert!(names.contains(&"Widget.render"));
        assert!(names.contains(&"Widget.hide"));

        let class = symbols.iter().find(|s| s.name == "Widget").unwrap();
        assert_eq!(class.kind, SymbolKind::Class);
        assert_eq!(class.methods.len(), 2);
        assert_eq!(class.methods[0].name, "render");
        assert!(class.docstring.as_deref().unwrap().contains("A widget"));

        let method = symbols.iter().find(|s| s.name == "Widget.render").unwrap();
        assert_eq!(method.kind, SymbolKind::Method);
        assert!(method.is_significant());
    }

    #[test]
    fn function_docstring_and_lines() {
        let symbols = PythonAst.parse(SRC).expect("parse ok");
        let f = symbols.iter().find(|s| s.name == "top").unwrap();
        assert_eq!(f.start_line, 3);
        assert!(f.docstring.as_deref().unwrap().contains("Adds things"));
    }
}
