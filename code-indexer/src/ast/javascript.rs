//! JavaScript / TypeScript AST provider backed by tree-sitter.
//!
//! Walks the whole tree: function declarations, arrow functions (named after
//! the variable they are assigned to when possible), and classes with their
//! methods. Method symbols are emitted as `Class.method`.

use tree_sitter::{Node, Parser};

use crate::ast::interface::AstProvider;
use crate::errors::{Error, Result};
use crate::types::{MethodRef, SymbolKind, SymbolRef};

pub struct JavascriptAst {
    typescript: bool,
}

impl JavascriptAst {
    pub fn new(typescript: bool) -> Self {
        Self { typescript }
    }
}

impl AstProvider for JavascriptAst {
    fn parse(&self, content: &str) -> Result<Vec<SymbolRef>> {
        let mut parser = Parser::new();
        let language = if self.typescript {
            tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
        } else {
            tree_sitter_javascript::LANGUAGE.into()
        };
        parser
            .set_language(&language)
            .map_err(|_| Error::TreeSitterLanguage)?;
        let tree = parser.parse(content, None).ok_or(Error::TreeSitterParse)?;

        let mut symbols = Vec::new();
        walk(tree.root_node(), content.as_bytes(), &mut symbols);
        Ok(symbols)
    }
}

fn walk(node: Node<'_>, src: &[u8], symbols: &mut Vec<SymbolRef>) {
    match node.kind() {
        "function_declaration" | "generator_function_declaration" => {
            symbols.push(SymbolRef {
                name: field_text(node, "name", src),
                kind: SymbolKind::Function,
                start_line: start_line(node),
                end_line: end_line(node),
                docstring: None,
                methods: vec![],
            });
        }
        "arrow_function" => {
            symbols.push(SymbolRef {
                name: assigned_name(node, src).unwrap_or_else(|| "arrow_function".to_string()),
                kind: SymbolKind::ArrowFunction,
                start_line: start_line(node),
                end_line: end_line(node),
                docstring: None,
                methods: vec![],
            });
        }
        "class_declaration" => {
            extract_class(node, src, symbols);
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, src, symbols);
    }
}

fn extract_class(node: Node<'_>, src: &[u8], symbols: &mut Vec<SymbolRef>) {
    let class_name = field_text(node, "name", src);
    let mut methods = Vec::new();
    let mut method_symbols = Vec::new();

    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for child in body.children(&mut cursor) {
            if child.kind() != "method_definition" {
                continue;
            }
            let method_name = field_text(child, "name", src);
            methods.push(MethodRef {
                name: method_name.clone(),
                lines: [start_line(child), end_line(child)],
            });
            method_symbols.push(SymbolRef {
                name: format!("{class_name}.{method_name}"),
                kind: SymbolKind::Method,
                start_line: start_line(child),
                end_line: end_line(child),
                docstring: None,
                methods: vec![],
            });
        }
    }

    symbols.push(SymbolRef {
        name: class_name,
        kind: SymbolKind::Class,
        start_line: start_line(node),
        end_line: end_line(node),
        docstring: None,
        methods,
    });
    symbols.extend(method_symbols);
}

/// Name from the enclosing `variable_declarator` / property, when assigned.
fn assigned_name(node: Node<'_>, src: &[u8]) -> Option<String> {
    let parent = node.parent()?;
    match parent.kind() {
        "variable_declarator" | "public_field_definition" => parent
            .child_by_field_name("name")
            .and_then(|n| n.utf8_text(src).ok())
            .map(str::to_string),
        "pair" => parent
            .child_by_field_name("key")
            .and_then(|n| n.utf8_text(src).ok())
            .map(str::to_string),
        _ => None,
    }
}

fn field_text(node: Node<'_>, field: &str, src: &[u8]) -> String {
    node.child_by_field_name(field)
        .and_then(|n| n.utf8_text(src).ok())
        .unwrap_or("anonymous")
        .to_string()
}

fn start_line(node: Node<'_>) -> u32 {
    node.start_position().row as u32 + 1
}

fn end_line(node: Node<'_>) -> u32 {
    node.end_position().row as u32 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: &str = r#"function plain(a) {
  return a + 1;
}

const handler = (req, res) => {
  const body = req.body;
  validate(body);
  res.send(body);
};

class Store {
  get(key) {
    return this.map[key];
  }
  set(key, value) {
    this.map[key] = value;
  }
}
"#;

    #[test]
    fn extracts_functions_arrows_and_classes() {
        let symbols = JavascriptAst::new(false).parse(SRC).expect("parse ok");
        let names: Vec<&str> = symbols.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"plain"));
        assert!(names.contains(&"handler"));
        assert!(names.contains(&"Store"));
        assert!(names.contains(&"Store.get"));
        assert!(names.contains(&"Store.set"));

        let arrow = symbols.iter().find(|s| s.name == "handler").unwrap();
        assert_eq!(arrow.kind, SymbolKind::ArrowFunction);

        let class = symbols.iter().find(|s| s.name == "Store").unwrap();
        assert_eq!(class.methods.len(), 2);
    }

    #[test]
    fn typescript_parses_annotations() {
        let src = "export function typed(x: number): string {\n  return String(x);\n}\n";
        let symbols = JavascriptAst::new(true).parse(src).expect("parse ok");
        assert_eq!(symbols[0].name, "typed");
        assert_eq!(symbols[0].kind, SymbolKind::Function);
    }
}
