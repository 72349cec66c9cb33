//! Parsing of pydeps JSON output.
//!
//! Shape: `{ "module.name": { "name": ..., "path": ..., "imports": [...],
//! "imported_by": [...] } }`. Multiple dumps merge by module name, later
//! files winning.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::errors::{IngestError, Result};

/// One module entry in a pydeps dump.
#[derive(Debug, Clone, Deserialize)]
pub struct PydepsModule {
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub imported_by: Vec<String>,
}

pub type PydepsMap = BTreeMap<String, PydepsModule>;

/// Load a single pydeps JSON file.
pub fn load_pydeps_json(path: &Path) -> Result<PydepsMap> {
    let content = std::fs::read_to_string(path)?;
    let map: PydepsMap = serde_json::from_str(&content)
        .map_err(|e| IngestError::Config(format!("invalid pydeps JSON in {}: {e}", path.display())))?;
    Ok(map)
}

/// Load and merge several pydeps JSON files.
pub fn load_multiple_pydeps(paths: &[&Path]) -> Result<PydepsMap> {
    let mut merged = PydepsMap::new();
    for path in paths {
        merged.extend(load_pydeps_json(path)?);
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_and_merges() {
        let dir = tempfile::tempdir().expect("tempdir");
        let a = dir.path().join("a.json");
        let b = dir.path().join("b.json");
        std::fs::write(
            &a,
            r#"{"app.core": {"name": "app.core", "imports": ["app.db"], "imported_by": []}}"#,
        )
        .unwrap();
        std::fs::write(
            &b,
            r#"{"app.db": {"name": "app.db", "imports": [], "imported_by": ["app.core"]}}"#,
        )
        .unwrap();

        let merged = load_multiple_pydeps(&[a.as_path(), b.as_path()]).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged["app.core"].imports, vec!["app.db"]);
    }
}
