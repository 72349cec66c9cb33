//! Language → provider dispatch.
//!
//! The table is built once at startup. Structural providers that error at
//! parse time fall back to the regex variant for the same language, so a
//! broken file still yields correctly-named symbols with approximate ranges.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::ast::generic_text::{CssAst, HtmlAst, RegexFallback};
use crate::ast::interface::AstProvider;
use crate::ast::javascript::JavascriptAst;
use crate::ast::python::PythonAst;
use crate::ast::svelte::SvelteAst;
use crate::types::{Language, SymbolRef};

/// Parser front-end held by the pipeline; cheap to share behind an `Arc`.
pub struct CodeParser {
    providers: HashMap<Language, Box<dyn AstProvider>>,
}

impl Default for CodeParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeParser {
    pub fn new() -> Self {
        let mut providers: HashMap<Language, Box<dyn AstProvider>> = HashMap::new();
        providers.insert(Language::Python, Box::new(PythonAst));
        providers.insert(Language::Javascript, Box::new(JavascriptAst::new(false)));
        providers.insert(Language::Typescript, Box::new(JavascriptAst::new(true)));
        providers.insert(Language::Svelte, Box::new(SvelteAst));
        providers.insert(Language::Html, Box::new(HtmlAst));
        providers.insert(Language::Css, Box::new(CssAst));
        debug!(languages = providers.len(), "code parser initialized");
        Self { providers }
    }

    /// Parse file content into symbols.
    ///
    /// Never fails: a structural provider error degrades to the regex
    /// fallback, and languages without any provider yield no symbols.
    pub fn parse(&self, language: Language, content: &str, file_path: &str) -> Vec<SymbolRef> {
        match self.providers.get(&language) {
            Some(provider) => match provider.parse(content) {
                Ok(symbols) => symbols,
                Err(e) => {
                    warn!(
                        file = file_path,
                        language = language.as_str(),
                        error = %e,
                        "structural parse failed, using regex fallback"
                    );
                    RegexFallback::new(language)
                        .parse(content)
                        .unwrap_or_default()
                }
            },
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_language_yields_no_symbols() {
        let parser = CodeParser::new();
        assert!(parser
            .parse(Language::Sql, "SELECT 1;", "schema.sql")
            .is_empty());
    }

    #[test]
    fn python_routes_to_structural_provider() {
        let parser = CodeParser::new();
        let symbols = parser.parse(
            Language::Python,
            "def f():\n    a = 1\n    b = 2\n    c = 3\n    return a\n",
            "m.py",
        );
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, "f");
    }
}
