//! Data models for incremental updates.

use serde_json::{Map, Value, json};

/// Outcome category for one repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoStatus {
    /// No changes (commit unchanged) or no relevant file changes.
    Skipped,
    /// In the exclusion list.
    Excluded,
    /// Incremental update completed.
    Updated,
    /// Threshold exceeded or new repo.
    FullReingest,
    /// Processed, but zero indexable files.
    Empty,
    /// Failed to process.
    Error,
    /// Orphaned repo's documents removed.
    Deleted,
}

impl RepoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Excluded => "excluded",
            Self::Updated => "updated",
            Self::FullReingest => "full_reingest",
            Self::Empty => "empty",
            Self::Error => "error",
            Self::Deleted => "deleted",
        }
    }
}

/// Result of processing a single repository.
#[derive(Debug, Clone)]
pub struct UpdateResult {
    pub repo_id: String,
    pub status: RepoStatus,
    pub reason: Option<String>,
    /// The commit that was processed, when one was reached.
    pub commit: Option<String>,
    pub files_processed: u32,
    pub files_deleted: u32,
    pub docs_created: u32,
    pub error: Option<String>,
    pub duration_seconds: f64,
}

impl UpdateResult {
    pub fn new(repo_id: &str, status: RepoStatus) -> Self {
        Self {
            repo_id: repo_id.to_string(),
            status,
            reason: None,
            commit: None,
            files_processed: 0,
            files_deleted: 0,
            docs_created: 0,
            error: None,
            duration_seconds: 0.0,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Storage shape for the run record's per-repo map. The repo id is the
    /// map key, so it is omitted; `None` fields are dropped to keep the
    /// document compact.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("status".into(), json!(self.status.as_str()));
        if let Some(reason) = &self.reason {
            map.insert("reason".into(), json!(reason));
        }
        if let Some(commit) = &self.commit {
            map.insert("commit".into(), json!(commit));
        }
        map.insert("files_processed".into(), json!(self.files_processed));
        map.insert("files_deleted".into(), json!(self.files_deleted));
        map.insert("docs_created".into(), json!(self.docs_created));
        if let Some(error) = &self.error {
            map.insert("error".into(), json!(error));
        }
        map.insert("duration_seconds".into(), json!(self.duration_seconds));
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_value_drops_none_fields() {
        let result = UpdateResult::new("acme/widget", RepoStatus::Skipped).with_reason("no_changes");
        let value = result.to_value();
        assert_eq!(value["status"], "skipped");
        assert_eq!(value["reason"], "no_changes");
        assert!(value.get("error").is_none());
        assert!(value.get("repo_id").is_none());
    }
}
