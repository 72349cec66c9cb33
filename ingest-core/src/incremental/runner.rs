//! Run driver: global advisory file lock, run record, per-repo dispatch,
//! and finalization on every exit path (completion, failure, Ctrl-C).

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use fs2::FileExt;
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

use crate::config::WorkerConfig;
use crate::errors::{IngestError, Result};
use crate::incremental::models::{RepoStatus, UpdateResult};
use crate::incremental::updater::IncrementalUpdater;
use crate::kpi;
use doc_store::DocumentStore;

/// Record of an ingestion run, written once per driver invocation.
#[derive(Debug, Clone)]
pub struct IngestionRun {
    pub run_id: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    /// running, completed, completed_with_errors, failed, interrupted.
    pub status: String,
    /// manual, scheduled, webhook.
    pub trigger: String,
    pub dry_run: bool,

    pub repos_processed: u32,
    pub repos_skipped: u32,
    pub repos_excluded: u32,
    pub repos_updated: u32,
    pub repos_full_reingest: u32,
    pub repos_empty: u32,
    pub repos_cloned: u32,
    pub repos_deleted: u32,
    pub repos_error: u32,
    pub files_processed: u32,
    pub files_deleted: u32,
    pub duration_seconds: f64,

    pub errors: Vec<Value>,
    /// Per-repo `UpdateResult` details keyed by repo id.
    pub repos: Map<String, Value>,
}

impl IngestionRun {
    fn new(run_id: String, trigger: &str, dry_run: bool) -> Self {
        Self {
            run_id,
            started_at: now_iso(),
            completed_at: None,
            status: "running".into(),
            trigger: trigger.into(),
            dry_run,
            repos_processed: 0,
            repos_skipped: 0,
            repos_excluded: 0,
            repos_updated: 0,
            repos_full_reingest: 0,
            repos_empty: 0,
            repos_cloned: 0,
            repos_deleted: 0,
            repos_error: 0,
            files_processed: 0,
            files_deleted: 0,
            duration_seconds: 0.0,
            errors: Vec::new(),
            repos: Map::new(),
        }
    }

    fn absorb(&mut self, result: &UpdateResult) {
        match result.status {
            RepoStatus::Skipped => self.repos_skipped += 1,
            RepoStatus::Excluded => self.repos_excluded += 1,
            RepoStatus::Updated => self.repos_updated += 1,
            RepoStatus::FullReingest => self.repos_full_reingest += 1,
            RepoStatus::Empty => self.repos_empty += 1,
            RepoStatus::Deleted => self.repos_deleted += 1,
            RepoStatus::Error => {
                self.repos_error += 1;
                self.errors.push(json!({
                    "repo_id": result.repo_id,
                    "error": result.error,
                }));
            }
        }
        self.files_processed += result.files_processed;
        self.files_deleted += result.files_deleted;
        self.repos.insert(result.repo_id.clone(), result.to_value());
    }

    /// Current-schema `ingestion_run` document with per-repo details.
    pub fn to_ingestion_run_doc(&self) -> Value {
        json!({
            "document_id": format!("ingestion_run:{}", self.run_id),
            "type": "ingestion_run",
            "run_id": self.run_id,
            "timestamp": self.started_at,
            "completed_at": self.completed_at,
            "duration_seconds": self.duration_seconds,
            "trigger": self.trigger,
            "dry_run": self.dry_run,
            "status": self.status,
            "stats": {
                "processed": self.repos_processed,
                "skipped": self.repos_skipped,
                "excluded": self.repos_excluded,
                "updated": self.repos_updated,
                "full_reingest": self.repos_full_reingest,
                "empty": self.repos_empty,
                "cloned": self.repos_cloned,
                "deleted": self.repos_deleted,
                "error": self.repos_error,
                "files_processed": self.files_processed,
                "files_deleted": self.files_deleted,
            },
            "repos": self.repos,
            "errors": if self.errors.is_empty() { Value::Null } else { json!(self.errors) },
        })
    }

    /// Legacy flat `ingestion_log` document, kept for compatibility with
    /// older dashboards.
    pub fn to_legacy_log_doc(&self) -> Value {
        json!({
            "document_id": format!("ingestion_log:{}", self.run_id),
            "type": "ingestion_log",
            "run_id": self.run_id,
            "started_at": self.started_at,
            "completed_at": self.completed_at,
            "status": self.status,
            "trigger": self.trigger,
            "dry_run": self.dry_run,
            "repos_processed": self.repos_processed,
            "repos_skipped": self.repos_skipped,
            "repos_excluded": self.repos_excluded,
            "repos_updated": self.repos_updated,
            "repos_full_reingest": self.repos_full_reingest,
            "repos_empty": self.repos_empty,
            "repos_cloned": self.repos_cloned,
            "repos_deleted": self.repos_deleted,
            "repos_error": self.repos_error,
            "files_processed": self.files_processed,
            "files_deleted": self.files_deleted,
            "duration_seconds": self.duration_seconds,
            "errors": self.errors,
        })
    }
}

/// What a finished run returns to the CLI.
#[derive(Debug)]
pub struct RunOutcome {
    pub results: Vec<UpdateResult>,
    pub record: IngestionRun,
}

impl RunOutcome {
    /// Completed cleanly (no failure, no interrupt). Errors on individual
    /// repos still count as a completed run.
    pub fn completed(&self) -> bool {
        self.record.status.starts_with("completed")
    }
}

/// Wraps the updater with the global lock, the run record, and best-effort
/// KPI regeneration.
pub struct IngestionRunner {
    cfg: WorkerConfig,
    store: Arc<dyn DocumentStore>,
    trigger: String,
    dry_run: bool,
}

impl IngestionRunner {
    pub fn new(
        cfg: WorkerConfig,
        store: Arc<dyn DocumentStore>,
        trigger: &str,
        dry_run: bool,
    ) -> Self {
        Self {
            cfg,
            store,
            trigger: trigger.to_string(),
            dry_run,
        }
    }

    /// Run the full driver under the global lock.
    ///
    /// # Errors
    /// [`IngestError::LockHeld`] when another run holds the lock — the only
    /// driver-level fatal error. Everything else is folded into the record.
    pub async fn run(
        &self,
        updater: &IncrementalUpdater,
        repo_filter: Option<&str>,
    ) -> Result<RunOutcome> {
        let run_id = make_run_id();
        let lock = self.acquire_lock()?;

        let mut record = IngestionRun::new(run_id.clone(), &self.trigger, self.dry_run);
        info!(run_id = %run_id, trigger = %self.trigger, "starting ingestion run");
        let started = Instant::now();

        // Ctrl-C finalizes the record as interrupted; the lock is released
        // on every path below.
        let mut results = Vec::new();
        tokio::select! {
            outcome = updater.run(repo_filter) => {
                record.repos_cloned = outcome.cloned;
                for result in &outcome.results {
                    record.absorb(result);
                }
                record.repos_processed = outcome.results.len() as u32;
                record.status = if record.repos_error == 0 {
                    "completed".into()
                } else {
                    "completed_with_errors".into()
                };
                results = outcome.results;
            }
            _ = tokio::signal::ctrl_c() => {
                warn!(run_id = %run_id, "ingestion interrupted by user");
                record.status = "interrupted".into();
            }
        }

        record.completed_at = Some(now_iso());
        record.duration_seconds = started.elapsed().as_secs_f64();

        self.save_record(&record).await;
        kpi::regenerate(self.store.as_ref(), &self.cfg.log_dir).await;
        self.release_lock(lock);

        info!(
            run_id = %run_id,
            status = %record.status,
            duration_s = format!("{:.1}", record.duration_seconds),
            "run finished"
        );
        Ok(RunOutcome { results, record })
    }

    /// Non-blocking exclusive lock on the well-known path; the lock file
    /// records the holder for diagnostics.
    fn acquire_lock(&self) -> Result<File> {
        if let Some(parent) = self.cfg.lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.cfg.lock_path)?;

        if file.try_lock_exclusive().is_err() {
            let info = std::fs::read_to_string(&self.cfg.lock_path).unwrap_or_default();
            let mut pid = None;
            let mut started = None;
            for line in info.lines() {
                match line.split_once('=') {
                    Some(("pid", v)) => pid = Some(v.to_string()),
                    Some(("started", v)) => started = Some(v.to_string()),
                    _ => {}
                }
            }
            return Err(IngestError::LockHeld { pid, started });
        }

        file.set_len(0)?;
        writeln!(file, "pid={}", std::process::id())?;
        writeln!(file, "started={}", now_iso())?;
        file.flush()?;
        Ok(file)
    }

    /// Unlock and remove the lock file. A crashed process skips this; the
    /// OS releases the flock and the stale file is truncated next run.
    fn release_lock(&self, file: File) {
        if let Err(e) = fs2::FileExt::unlock(&file) {
            warn!(error = %e, "failed to unlock lock file");
        }
        drop(file);
        if let Err(e) = std::fs::remove_file(&self.cfg.lock_path) {
            warn!(error = %e, "failed to remove lock file");
        }
    }

    /// Writes both the current-schema run record and the legacy log shape.
    async fn save_record(&self, record: &IngestionRun) {
        if self.dry_run {
            return;
        }
        let run_doc = record.to_ingestion_run_doc();
        let run_id = run_doc["document_id"].as_str().unwrap_or_default().to_string();
        if let Err(e) = self.store.upsert(&run_id, &run_doc).await {
            error!(error = %e, "failed to save ingestion_run record");
        }
        let legacy = record.to_legacy_log_doc();
        let legacy_id = legacy["document_id"].as_str().unwrap_or_default().to_string();
        if let Err(e) = self.store.upsert(&legacy_id, &legacy).await {
            error!(error = %e, "failed to save legacy ingestion_log record");
        }
    }
}

/// `<yyyymmdd_hhmmss>_<6 hex>`; the suffix hashes pid and clock nanos.
fn make_run_id() -> String {
    let now = chrono::Utc::now();
    let nanos = now.timestamp_nanos_opt().unwrap_or_default();
    let digest = Sha256::digest(format!("{}:{nanos}", std::process::id()).as_bytes());
    let suffix: String = digest.iter().take(3).map(|b| format!("{b:02x}")).collect();
    format!("{}_{suffix}", now.format("%Y%m%d_%H%M%S"))
}

fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_shape() {
        let id = make_run_id();
        let (stamp, suffix) = id.rsplit_once('_').expect("suffix");
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(stamp.len(), "yyyymmdd_hhmmss".len());
    }

    #[test]
    fn record_absorbs_results_by_status() {
        let mut record = IngestionRun::new("r1".into(), "manual", false);
        record.absorb(&UpdateResult::new("a/one", RepoStatus::Updated));
        record.absorb(&UpdateResult::new("a/two", RepoStatus::Skipped));
        record.absorb(
            &UpdateResult::new("a/three", RepoStatus::Error).with_error("git exploded"),
        );
        assert_eq!(record.repos_updated, 1);
        assert_eq!(record.repos_skipped, 1);
        assert_eq!(record.repos_error, 1);
        assert_eq!(record.errors.len(), 1);
        assert!(record.repos.contains_key("a/three"));

        let doc = record.to_ingestion_run_doc();
        assert_eq!(doc["type"], "ingestion_run");
        assert_eq!(doc["stats"]["updated"], 1);
        let legacy = record.to_legacy_log_doc();
        assert_eq!(legacy["type"], "ingestion_log");
    }
}
