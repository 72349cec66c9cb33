//! The document store contract and its N1QL-over-HTTP implementation.
//!
//! All interactions go through the query service: upserts, key lookups, the
//! parameterised selects the incremental updater needs, and the predicate
//! deletes used for whole-repo and per-file cleanup. Keeping everything
//! behind one facade keeps the rest of the workspace decoupled from the
//! store wire protocol.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::errors::StoreError;

/// Store capability consumed by the pipeline. Upserts are idempotent:
/// document ids are content-derived, so re-writing the same bytes is safe.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn upsert(&self, doc_id: &str, doc: &Value) -> Result<(), StoreError>;
    async fn get(&self, doc_id: &str) -> Result<Option<Value>, StoreError>;

    /// All repo ids that have any document in the store.
    async fn distinct_repo_ids(&self) -> Result<HashSet<String>, StoreError>;
    /// Commit hash recorded on the repo summary, if any.
    async fn stored_commit(&self, repo_id: &str) -> Result<Option<String>, StoreError>;
    /// Number of `file_index` documents for the repo.
    async fn file_index_count(&self, repo_id: &str) -> Result<u64, StoreError>;
    /// Existing file summary for `(repo, path)`, if any.
    async fn file_summary(&self, repo_id: &str, file_path: &str)
    -> Result<Option<String>, StoreError>;
    /// Existing file embedding for `(repo, path)`, if any.
    async fn file_embedding(
        &self,
        repo_id: &str,
        file_path: &str,
    ) -> Result<Option<Vec<f32>>, StoreError>;
    /// All `file_index` documents for the repo.
    async fn file_indices(&self, repo_id: &str) -> Result<Vec<Value>, StoreError>;
    /// Recent `ingestion_run` documents, newest first.
    async fn recent_runs(&self, limit: usize) -> Result<Vec<Value>, StoreError>;

    /// Delete every document for the repo. Returns mutation count.
    async fn delete_repo_docs(&self, repo_id: &str) -> Result<u64, StoreError>;
    /// Delete the file/symbol documents for one file.
    async fn delete_file_docs(&self, repo_id: &str, file_path: &str) -> Result<u64, StoreError>;
    /// Delete the documentation chunks for one file.
    async fn delete_doc_chunks(&self, repo_id: &str, file_path: &str) -> Result<u64, StoreError>;
    /// Delete all module and repo summaries for the repo.
    async fn delete_summaries(&self, repo_id: &str) -> Result<u64, StoreError>;
}

/// N1QL query-service client.
pub struct CouchbaseStore {
    client: reqwest::Client,
    cfg: StoreConfig,
    url: String,
}

impl CouchbaseStore {
    pub fn new(cfg: StoreConfig) -> Result<Self, StoreError> {
        cfg.validate()?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        let url = format!("{}/query/service", cfg.base_url);
        info!(bucket = %cfg.bucket, "CouchbaseStore initialized");
        Ok(Self { client, cfg, url })
    }

    /// Runs one parameterised statement and returns `(rows, mutation_count)`.
    async fn query(&self, statement: String, params: Value) -> Result<(Vec<Value>, u64), StoreError> {
        let mut body = match params {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        body.insert("statement".into(), Value::String(statement.clone()));

        debug!(statement = %statement, "query service call");
        let resp = self
            .client
            .post(&self.url)
            .basic_auth(&self.cfg.username, Some(&self.cfg.password))
            .json(&Value::Object(body))
            .send()
            .await?;

        let status = resp.status();
        let payload: QueryResponse = if status.is_success() {
            resp.json().await?
        } else {
            let text = resp.text().await.unwrap_or_default();
            return Err(StoreError::Query {
                status: status.to_string(),
                snippet: text.chars().take(240).collect(),
            });
        };

        if payload.status != "success" {
            return Err(StoreError::Query {
                status: payload.status,
                snippet: serde_json::to_string(&payload.errors).unwrap_or_default(),
            });
        }

        let mutations = payload.metrics.map(|m| m.mutation_count).unwrap_or(0);
        Ok((payload.results, mutations))
    }

    fn bucket(&self) -> String {
        format!("`{}`", self.cfg.bucket)
    }
}

#[async_trait]
impl DocumentStore for CouchbaseStore {
    async fn upsert(&self, doc_id: &str, doc: &Value) -> Result<(), StoreError> {
        let stmt = format!(
            "UPSERT INTO {} (KEY, VALUE) VALUES ($id, $doc)",
            self.bucket()
        );
        self.query(stmt, json!({ "$id": doc_id, "$doc": doc })).await?;
        Ok(())
    }

    async fn get(&self, doc_id: &str) -> Result<Option<Value>, StoreError> {
        let stmt = format!("SELECT RAW d FROM {} AS d USE KEYS [$id]", self.bucket());
        let (rows, _) = self.query(stmt, json!({ "$id": doc_id })).await?;
        Ok(rows.into_iter().next())
    }

    async fn distinct_repo_ids(&self) -> Result<HashSet<String>, StoreError> {
        let stmt = format!(
            "SELECT DISTINCT repo_id FROM {} WHERE repo_id IS NOT MISSING",
            self.bucket()
        );
        let (rows, _) = self.query(stmt, json!({})).await?;
        Ok(rows
            .into_iter()
            .filter_map(|r| r.get("repo_id").and_then(Value::as_str).map(String::from))
            .collect())
    }

    async fn stored_commit(&self, repo_id: &str) -> Result<Option<String>, StoreError> {
        let stmt = format!(
            "SELECT commit_hash FROM {} WHERE repo_id = $repo_id AND type = 'repo_summary' LIMIT 1",
            self.bucket()
        );
        let (rows, _) = self.query(stmt, json!({ "$repo_id": repo_id })).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|r| r.get("commit_hash").and_then(Value::as_str).map(String::from)))
    }

    async fn file_index_count(&self, repo_id: &str) -> Result<u64, StoreError> {
        let stmt = format!(
            "SELECT COUNT(*) AS count FROM {} WHERE repo_id = $repo_id AND type = 'file_index'",
            self.bucket()
        );
        let (rows, _) = self.query(stmt, json!({ "$repo_id": repo_id })).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|r| r.get("count").and_then(Value::as_u64))
            .unwrap_or(0))
    }

    async fn file_summary(
        &self,
        repo_id: &str,
        file_path: &str,
    ) -> Result<Option<String>, StoreError> {
        let stmt = format!(
            "SELECT content FROM {} WHERE repo_id = $repo_id AND file_path = $file_path \
             AND type = 'file_index' LIMIT 1",
            self.bucket()
        );
        let (rows, _) = self
            .query(stmt, json!({ "$repo_id": repo_id, "$file_path": file_path }))
            .await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|r| r.get("content").and_then(Value::as_str).map(String::from)))
    }

    async fn file_embedding(
        &self,
        repo_id: &str,
        file_path: &str,
    ) -> Result<Option<Vec<f32>>, StoreError> {
        let stmt = format!(
            "SELECT embedding FROM {} WHERE repo_id = $repo_id AND file_path = $file_path \
             AND type = 'file_index' LIMIT 1",
            self.bucket()
        );
        let (rows, _) = self
            .query(stmt, json!({ "$repo_id": repo_id, "$file_path": file_path }))
            .await?;
        Ok(rows.into_iter().next().and_then(|r| {
            r.get("embedding").and_then(Value::as_array).map(|arr| {
                arr.iter()
                    .filter_map(Value::as_f64)
                    .map(|f| f as f32)
                    .collect()
            })
        }))
    }

    async fn file_indices(&self, repo_id: &str) -> Result<Vec<Value>, StoreError> {
        let stmt = format!(
            "SELECT {b}.* FROM {b} WHERE repo_id = $repo_id AND type = 'file_index'",
            b = self.bucket()
        );
        let (rows, _) = self.query(stmt, json!({ "$repo_id": repo_id })).await?;
        Ok(rows)
    }

    async fn recent_runs(&self, limit: usize) -> Result<Vec<Value>, StoreError> {
        let stmt = format!(
            "SELECT {b}.* FROM {b} WHERE type = 'ingestion_run' ORDER BY timestamp DESC LIMIT $limit",
            b = self.bucket()
        );
        let (rows, _) = self.query(stmt, json!({ "$limit": limit })).await?;
        Ok(rows)
    }

    async fn delete_repo_docs(&self, repo_id: &str) -> Result<u64, StoreError> {
        let stmt = format!("DELETE FROM {} WHERE repo_id = $repo_id", self.bucket());
        let (_, mutations) = self.query(stmt, json!({ "$repo_id": repo_id })).await?;
        info!(repo = repo_id, deleted = mutations, "deleted repo documents");
        Ok(mutations)
    }

    async fn delete_file_docs(&self, repo_id: &str, file_path: &str) -> Result<u64, StoreError> {
        let stmt = format!(
            "DELETE FROM {} WHERE repo_id = $repo_id AND file_path = $file_path \
             AND type IN ['file_index', 'symbol_index']",
            self.bucket()
        );
        let (_, mutations) = self
            .query(stmt, json!({ "$repo_id": repo_id, "$file_path": file_path }))
            .await?;
        Ok(mutations)
    }

    async fn delete_doc_chunks(&self, repo_id: &str, file_path: &str) -> Result<u64, StoreError> {
        let stmt = format!(
            "DELETE FROM {} WHERE repo_id = $repo_id AND file_path = $file_path \
             AND type = 'document'",
            self.bucket()
        );
        let (_, mutations) = self
            .query(stmt, json!({ "$repo_id": repo_id, "$file_path": file_path }))
            .await?;
        Ok(mutations)
    }

    async fn delete_summaries(&self, repo_id: &str) -> Result<u64, StoreError> {
        let stmt = format!(
            "DELETE FROM {} WHERE repo_id = $repo_id AND type IN ['module_summary', 'repo_summary']",
            self.bucket()
        );
        let (_, mutations) = self.query(stmt, json!({ "$repo_id": repo_id })).await?;
        Ok(mutations)
    }
}

/* ===========================================================================
Query service payloads
======================================================================== */

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    errors: Vec<Value>,
    #[serde(default)]
    metrics: Option<QueryMetrics>,
}

#[derive(Debug, Deserialize)]
struct QueryMetrics {
    #[serde(rename = "mutationCount", default)]
    mutation_count: u64,
}
