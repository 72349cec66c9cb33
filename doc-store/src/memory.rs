//! In-memory store used by the test suite and dry runs.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::StoreError;
use crate::store::DocumentStore;

/// HashMap-backed [`DocumentStore`]. Same query semantics as the real
/// store, evaluated over the documents' JSON fields.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.lock().expect("store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all documents, for assertions.
    pub fn all(&self) -> Vec<Value> {
        self.docs
            .lock()
            .expect("store mutex poisoned")
            .values()
            .cloned()
            .collect()
    }

    fn select<F>(&self, pred: F) -> Vec<Value>
    where
        F: Fn(&Value) -> bool,
    {
        self.docs
            .lock()
            .expect("store mutex poisoned")
            .values()
            .filter(|v| pred(v))
            .cloned()
            .collect()
    }

    fn delete_where<F>(&self, pred: F) -> u64
    where
        F: Fn(&Value) -> bool,
    {
        let mut docs = self.docs.lock().expect("store mutex poisoned");
        let before = docs.len();
        docs.retain(|_, v| !pred(v));
        (before - docs.len()) as u64
    }
}

fn field<'a>(doc: &'a Value, name: &str) -> Option<&'a str> {
    doc.get(name).and_then(Value::as_str)
}

fn matches(doc: &Value, repo_id: &str, doc_type: Option<&[&str]>) -> bool {
    field(doc, "repo_id") == Some(repo_id)
        && doc_type.is_none_or(|types| field(doc, "type").is_some_and(|t| types.contains(&t)))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn upsert(&self, doc_id: &str, doc: &Value) -> Result<(), StoreError> {
        self.docs
            .lock()
            .expect("store mutex poisoned")
            .insert(doc_id.to_string(), doc.clone());
        Ok(())
    }

    async fn get(&self, doc_id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self
            .docs
            .lock()
            .expect("store mutex poisoned")
            .get(doc_id)
            .cloned())
    }

    async fn distinct_repo_ids(&self) -> Result<HashSet<String>, StoreError> {
        Ok(self
            .docs
            .lock()
            .expect("store mutex poisoned")
            .values()
            .filter_map(|v| field(v, "repo_id").map(String::from))
            .collect())
    }

    async fn stored_commit(&self, repo_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .select(|v| matches(v, repo_id, Some(&["repo_summary"])))
            .first()
            .and_then(|v| field(v, "commit_hash").map(String::from)))
    }

    async fn file_index_count(&self, repo_id: &str) -> Result<u64, StoreError> {
        Ok(self.select(|v| matches(v, repo_id, Some(&["file_index"]))).len() as u64)
    }

    async fn file_summary(
        &self,
        repo_id: &str,
        file_path: &str,
    ) -> Result<Option<String>, StoreError> {
        Ok(self
            .select(|v| {
                matches(v, repo_id, Some(&["file_index"])) && field(v, "file_path") == Some(file_path)
            })
            .first()
            .and_then(|v| field(v, "content").map(String::from)))
    }

    async fn file_embedding(
        &self,
        repo_id: &str,
        file_path: &str,
    ) -> Result<Option<Vec<f32>>, StoreError> {
        Ok(self
            .select(|v| {
                matches(v, repo_id, Some(&["file_index"])) && field(v, "file_path") == Some(file_path)
            })
            .first()
            .and_then(|v| v.get("embedding"))
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_f64)
                    .map(|f| f as f32)
                    .collect()
            }))
    }

    async fn file_indices(&self, repo_id: &str) -> Result<Vec<Value>, StoreError> {
        Ok(self.select(|v| matches(v, repo_id, Some(&["file_index"]))))
    }

    async fn recent_runs(&self, limit: usize) -> Result<Vec<Value>, StoreError> {
        let mut runs = self.select(|v| field(v, "type") == Some("ingestion_run"));
        runs.sort_by(|a, b| {
            field(b, "timestamp")
                .unwrap_or("")
                .cmp(field(a, "timestamp").unwrap_or(""))
        });
        runs.truncate(limit);
        Ok(runs)
    }

    async fn delete_repo_docs(&self, repo_id: &str) -> Result<u64, StoreError> {
        Ok(self.delete_where(|v| field(v, "repo_id") == Some(repo_id)))
    }

    async fn delete_file_docs(&self, repo_id: &str, file_path: &str) -> Result<u64, StoreError> {
        Ok(self.delete_where(|v| {
            matches(v, repo_id, Some(&["file_index", "symbol_index"]))
                && field(v, "file_path") == Some(file_path)
        }))
    }

    async fn delete_doc_chunks(&self, repo_id: &str, file_path: &str) -> Result<u64, StoreError> {
        Ok(self.delete_where(|v| {
            matches(v, repo_id, Some(&["document"])) && field(v, "file_path") == Some(file_path)
        }))
    }

    async fn delete_summaries(&self, repo_id: &str) -> Result<u64, StoreError> {
        Ok(self.delete_where(|v| matches(v, repo_id, Some(&["module_summary", "repo_summary"]))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let store = MemoryStore::new();
        let doc = json!({"type": "file_index", "repo_id": "a/b", "file_path": "x.py"});
        store.upsert("id1", &doc).await.unwrap();
        store.upsert("id1", &doc).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn typed_queries_filter_by_repo_and_type() {
        let store = MemoryStore::new();
        store
            .upsert(
                "r1",
                &json!({"type": "repo_summary", "repo_id": "a/b", "commit_hash": "abc123"}),
            )
            .await
            .unwrap();
        store
            .upsert(
                "f1",
                &json!({"type": "file_index", "repo_id": "a/b", "file_path": "x.py", "content": "sum"}),
            )
            .await
            .unwrap();

        assert_eq!(store.stored_commit("a/b").await.unwrap().unwrap(), "abc123");
        assert_eq!(store.file_index_count("a/b").await.unwrap(), 1);
        assert_eq!(
            store.file_summary("a/b", "x.py").await.unwrap().unwrap(),
            "sum"
        );
        assert_eq!(store.file_index_count("other/repo").await.unwrap(), 0);

        assert_eq!(store.delete_repo_docs("a/b").await.unwrap(), 2);
        assert!(store.is_empty());
    }
}
