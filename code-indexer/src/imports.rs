//! Per-language import extraction used for tech-stack detection.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::Language;

/// Cap on imports reported per file.
const MAX_IMPORTS: usize = 30;

static PY_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:from\s+([\w.]+)\s+import|import\s+([\w.]+))").expect("valid regex")
});
static JS_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:import|require)\s*\(?['"]([^'"]+)['"]"#).expect("valid regex")
});

/// Extract import targets from file content.
pub fn extract_imports(content: &str, language: Language) -> Vec<String> {
    let mut imports = Vec::new();

    match language {
        Language::Python => {
            for cap in PY_IMPORT.captures_iter(content) {
                if let Some(m) = cap.get(1).or_else(|| cap.get(2)) {
                    imports.push(m.as_str().to_string());
                }
            }
        }
        Language::Javascript | Language::Typescript | Language::Svelte | Language::Vue => {
            for cap in JS_IMPORT.captures_iter(content) {
                imports.push(cap[1].to_string());
            }
        }
        _ => {}
    }

    imports.truncate(MAX_IMPORTS);
    imports
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_from_and_plain_imports() {
        let src = "import os\nfrom django.db import models\nx = 1\n";
        let imports = extract_imports(src, Language::Python);
        assert_eq!(imports, vec!["os", "django.db"]);
    }

    #[test]
    fn javascript_import_and_require() {
        let src = "import React from 'react';\nconst fs = require(\"fs\");\n";
        let imports = extract_imports(src, Language::Javascript);
        assert_eq!(imports, vec!["react", "fs"]);
    }

    #[test]
    fn capped_at_thirty() {
        let src = (0..40)
            .map(|i| format!("import mod{i}\n"))
            .collect::<String>();
        assert_eq!(extract_imports(&src, Language::Python).len(), 30);
    }
}
