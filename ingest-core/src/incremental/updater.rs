//! Git-based incremental updater: per-repo decision between skip,
//! incremental update, and full re-ingest, plus the canonical-set phases
//! (clone new, delete orphaned, process surviving).

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use code_indexer::util::fs_scan::{CODE_EXTENSIONS, DOC_EXTENSIONS, should_skip_file};
use doc_store::{DOC_PREFIX, DocumentStore, EmbeddingProvider, embed_texts};
use git_engine::GitOps;
use tracing::{debug, error, info, warn};

use crate::aggregator::parent_folder;
use crate::config::WorkerConfig;
use crate::docs::DocumentIngester;
use crate::errors::Result;
use crate::incremental::lifecycle::RepoLifecycle;
use crate::incremental::models::{RepoStatus, UpdateResult};
use crate::incremental::significance::SignificanceGate;
use crate::pipeline::IngestPipeline;
use crate::schemas::{FileIndex, SymbolIndex, module_doc_id};

/// Results of one updater sweep over the canonical set.
#[derive(Debug, Default)]
pub struct UpdateOutcome {
    pub results: Vec<UpdateResult>,
    pub cloned: u32,
}

/// Orchestrates incremental updates across the canonical repository set.
pub struct IncrementalUpdater {
    cfg: WorkerConfig,
    pipeline: IngestPipeline,
    lifecycle: RepoLifecycle,
    gate: SignificanceGate,
    git: GitOps,
    store: Arc<dyn DocumentStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    dry_run: bool,
    /// Gate consults embeddings only when the LLM/embedding path is on.
    use_gate_embeddings: bool,
}

impl IncrementalUpdater {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cfg: WorkerConfig,
        pipeline: IngestPipeline,
        lifecycle: RepoLifecycle,
        gate: SignificanceGate,
        store: Arc<dyn DocumentStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        dry_run: bool,
        use_gate_embeddings: bool,
    ) -> Self {
        Self {
            cfg,
            pipeline,
            lifecycle,
            gate,
            git: GitOps,
            store,
            embedder,
            dry_run,
            use_gate_embeddings,
        }
    }

    /// Full sweep: discovery, clone, orphan cleanup, per-repo dispatch.
    pub async fn run(&self, repo_filter: Option<&str>) -> UpdateOutcome {
        info!(
            threshold = self.cfg.threshold,
            dry_run = self.dry_run,
            "incremental update sweep starting"
        );

        // Phase 1: repository discovery.
        let canonical: HashSet<String> = match repo_filter {
            Some(repo) => {
                info!(repo, "single repo mode");
                HashSet::from([repo.to_string()])
            }
            None => self.lifecycle.canonical_repo_list().await.into_iter().collect(),
        };
        let on_disk: HashSet<String> = self.lifecycle.discover_repos_on_disk().into_iter().collect();
        let in_store = self.lifecycle.repos_in_store().await;

        let new_repos: Vec<&String> = canonical.difference(&on_disk).collect();
        let orphaned: Vec<&String> = in_store.difference(&canonical).collect();
        let mut to_process: HashSet<String> = canonical.intersection(&on_disk).cloned().collect();

        info!(
            canonical = canonical.len(),
            to_clone = new_repos.len(),
            to_process = to_process.len(),
            orphaned = orphaned.len(),
            "repository status"
        );

        let mut outcome = UpdateOutcome::default();

        // Phase 2: clone new repos.
        let mut sorted_new: Vec<&String> = new_repos;
        sorted_new.sort();
        for repo_id in sorted_new {
            match self.lifecycle.clone_repo(repo_id).await {
                Ok(()) => {
                    to_process.insert(repo_id.clone());
                    outcome.cloned += 1;
                }
                Err(e) => {
                    error!(repo = %repo_id, error = %e, "clone failed");
                    outcome.results.push(
                        UpdateResult::new(repo_id, RepoStatus::Error)
                            .with_error(format!("clone failed: {e}")),
                    );
                }
            }
        }

        // Phase 3: delete orphaned repos (skipped in single-repo mode).
        if repo_filter.is_none() {
            let mut sorted_orphans: Vec<&String> = orphaned;
            sorted_orphans.sort();
            for repo_id in sorted_orphans {
                let deleted = self.lifecycle.delete_repo(repo_id, self.dry_run).await;
                let mut result =
                    UpdateResult::new(repo_id, RepoStatus::Deleted).with_reason("orphaned");
                result.files_deleted = deleted as u32;
                outcome.results.push(result);
            }
        }

        // Phase 4: per-repo processing; failures never abort the sweep.
        let mut sorted: Vec<String> = to_process.into_iter().collect();
        sorted.sort();
        for repo_id in sorted {
            if self.cfg.excluded_repos.contains(&repo_id) {
                info!(repo = %repo_id, "excluded");
                outcome
                    .results
                    .push(UpdateResult::new(&repo_id, RepoStatus::Excluded).with_reason("exclusion_list"));
                continue;
            }
            let repo_path = self.lifecycle.repo_id_to_path(&repo_id);
            let result = match self.process_repo(&repo_id, &repo_path).await {
                Ok(result) => result,
                Err(e) => {
                    error!(repo = %repo_id, error = %e, "repo processing failed");
                    UpdateResult::new(&repo_id, RepoStatus::Error).with_error(e.to_string())
                }
            };
            outcome.results.push(result);
        }

        outcome
    }

    /// The per-repo state machine.
    pub async fn process_repo(&self, repo_id: &str, repo_path: &Path) -> Result<UpdateResult> {
        let started = Instant::now();
        info!(repo = repo_id, "processing");

        // 1. Fetch latest from origin.
        if let Err(e) = self.git.fetch(repo_path).await {
            return Ok(UpdateResult::new(repo_id, RepoStatus::Error)
                .with_error(format!("git fetch failed: {e}")));
        }

        // 2. Commits on both ends.
        let local_head = self.git.rev_parse(repo_path, "HEAD").await.ok();
        let Some(origin_head) = self.git.origin_head(repo_path).await else {
            return Ok(UpdateResult::new(repo_id, RepoStatus::Error)
                .with_error("could not determine origin HEAD"));
        };
        let stored_commit = self.store.stored_commit(repo_id).await.unwrap_or(None);

        // 3. Nothing moved anywhere: skip.
        if let Some(stored) = &stored_commit {
            if local_head.as_deref() == Some(stored.as_str()) && *stored == origin_head {
                info!(repo = repo_id, commit = %crate::schemas::commit12(stored), "skipping, no changes");
                return Ok(finish(
                    UpdateResult::new(repo_id, RepoStatus::Skipped).with_reason("no_changes"),
                    started,
                ));
            }
        }

        // 4. New repo: full ingestion.
        let Some(stored_commit) = stored_commit else {
            info!(repo = repo_id, "new repo, full ingestion");
            return Ok(finish(
                self.full_reingest(repo_id, repo_path, "new_repo", &origin_head).await?,
                started,
            ));
        };

        // 5. Changed files between the stored commit and origin HEAD.
        let changes = self
            .git
            .changed_files(repo_path, &stored_commit, &origin_head)
            .await?;
        if changes.is_empty() {
            info!(repo = repo_id, "skipping, no file changes");
            return Ok(finish(
                UpdateResult::new(repo_id, RepoStatus::Skipped).with_reason("no_file_changes"),
                started,
            ));
        }

        // 6. Threshold policy.
        let existing_files = self.store.file_index_count(repo_id).await.unwrap_or(0);
        let change_ratio = change_ratio(changes.total_changed(), existing_files);
        if change_ratio > self.cfg.threshold {
            info!(
                repo = repo_id,
                changed = changes.total_changed(),
                ratio = format!("{:.1}%", change_ratio * 100.0),
                "threshold exceeded, full re-ingestion"
            );
            let reason = format!("threshold_exceeded ({:.1}%)", change_ratio * 100.0);
            let mut result = self
                .full_reingest(repo_id, repo_path, &reason, &origin_head)
                .await?;
            result.files_processed = changes.total_changed() as u32;
            return Ok(finish(result, started));
        }

        // 7. Surgical incremental update.
        info!(
            repo = repo_id,
            added = changes.added.len(),
            modified = changes.modified.len(),
            deleted = changes.deleted.len(),
            "incremental update"
        );
        if !self.dry_run {
            if let Err(e) = self.git.pull_ff_only(repo_path).await {
                warn!(repo = repo_id, error = %e, "pull --ff-only failed, processing fetched state");
            }
        }

        let (code_files, doc_files) = partition_supported(&changes.files_to_process(), repo_path);
        let (code_deleted, docs_deleted) = partition_supported(&changes.deleted, repo_path);

        let mut files_deleted = 0u32;
        for file_path in &code_deleted {
            if !self.dry_run {
                self.store.delete_file_docs(repo_id, file_path).await?;
            }
            files_deleted += 1;
        }
        for file_path in &docs_deleted {
            if !self.dry_run {
                self.store.delete_doc_chunks(repo_id, file_path).await?;
            }
            files_deleted += 1;
        }

        if self.dry_run {
            info!(
                repo = repo_id,
                code = code_files.len(),
                docs = doc_files.len(),
                "[dry run] would process changed files"
            );
            let mut result = UpdateResult::new(repo_id, RepoStatus::Updated).with_reason("dry_run");
            result.files_processed = (code_files.len() + doc_files.len()) as u32;
            result.files_deleted = files_deleted;
            result.commit = Some(origin_head);
            return Ok(finish(result, started));
        }

        // 7b. Reprocess changed code files, gating ancestor regeneration.
        let mut file_indices: Vec<FileIndex> = Vec::new();
        let mut symbol_indices: Vec<SymbolIndex> = Vec::new();
        let mut old_summaries: Vec<(String, Option<String>, Option<Vec<f32>>, String)> = Vec::new();
        let mut files_processed = 0u32;

        for file_path in &code_files {
            let full_path = repo_path.join(file_path);
            if !full_path.exists() {
                continue;
            }

            let old_summary = self.store.file_summary(repo_id, file_path).await.unwrap_or(None);
            let old_embedding = if self.use_gate_embeddings {
                self.store.file_embedding(repo_id, file_path).await.unwrap_or(None)
            } else {
                None
            };
            let diff_text = self
                .git
                .file_diff(repo_path, &stored_commit, &origin_head, file_path)
                .await;

            // Delete-then-write keeps exactly one file_index per (repo, path).
            self.store.delete_file_docs(repo_id, file_path).await?;

            let parent_module_id =
                module_doc_id(repo_id, &parent_folder(file_path), &origin_head);
            match self
                .pipeline
                .processor
                .process(&full_path, repo_path, repo_id, &origin_head, &parent_module_id)
                .await
            {
                Ok(Some((file_doc, symbol_docs))) => {
                    old_summaries.push((diff_text, old_summary, old_embedding, file_path.clone()));
                    file_indices.push(file_doc);
                    symbol_indices.extend(symbol_docs);
                    files_processed += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    error!(repo = repo_id, file = %file_path, error = %e, "error processing file");
                }
            }
        }

        // 7c. Batch-embed and upsert the staged documents.
        self.embed_staged(&mut file_indices, &mut symbol_indices).await?;
        let mut docs_created = 0u32;
        for (doc_id, value) in file_indices
            .iter()
            .map(|f| (f.document_id.clone(), f.to_value()))
            .chain(symbol_indices.iter().map(|s| (s.document_id.clone(), s.to_value())))
        {
            self.store.upsert(&doc_id, &value).await?;
            docs_created += 1;
        }

        // 7d. Significance gate decides whether ancestors regenerate.
        let mut any_significant = false;
        for (i, (diff_text, old_summary, old_embedding, file_path)) in
            old_summaries.iter().enumerate()
        {
            let new_summary = &file_indices[i].content;
            let significant = self
                .gate
                .is_significant(
                    old_summary.as_deref().unwrap_or(""),
                    new_summary,
                    diff_text,
                    old_embedding.as_deref(),
                    self.use_gate_embeddings.then_some(self.embedder.as_ref()),
                )
                .await;
            debug!(file = %file_path, significant, "gate decision");
            any_significant |= significant;
        }

        if any_significant || !code_deleted.is_empty() {
            let affected = affected_modules(code_files.iter().chain(code_deleted.iter()));
            info!(
                repo = repo_id,
                modules = affected.len(),
                "regenerating ancestor summaries"
            );
            self.regenerate_summaries(repo_id, &origin_head).await?;
        } else {
            info!(repo = repo_id, "no significant file changes, skipping ancestor regeneration");
        }

        // 7e. Documentation pipeline for changed doc files.
        if !doc_files.is_empty() {
            let ingester = DocumentIngester::new(
                Arc::clone(&self.store),
                Arc::clone(&self.embedder),
                self.dry_run,
            );
            for file_path in &doc_files {
                let full_path = repo_path.join(file_path);
                if !full_path.exists() {
                    continue;
                }
                self.store.delete_doc_chunks(repo_id, file_path).await?;
                match ingester.process_doc(&full_path, repo_path, repo_id).await {
                    Ok(chunks) => {
                        docs_created += chunks as u32;
                        files_processed += 1;
                    }
                    Err(e) => {
                        error!(repo = repo_id, file = %file_path, error = %e, "doc processing failed")
                    }
                }
            }
        }

        let mut result = UpdateResult::new(repo_id, RepoStatus::Updated);
        result.files_processed = files_processed;
        result.files_deleted = files_deleted;
        result.docs_created = docs_created;
        result.commit = Some(origin_head);
        info!(
            repo = repo_id,
            processed = files_processed,
            deleted = files_deleted,
            "incremental update complete"
        );
        Ok(finish(result, started))
    }

    /// Pull then run the full pipeline; maps an empty repo to `empty`.
    async fn full_reingest(
        &self,
        repo_id: &str,
        repo_path: &Path,
        reason: &str,
        origin_head: &str,
    ) -> Result<UpdateResult> {
        if !self.dry_run {
            if let Err(e) = self.git.pull_ff_only(repo_path).await {
                warn!(repo = repo_id, error = %e, "pull --ff-only failed before full ingest");
            }
            let report = self
                .pipeline
                .ingest_repository(repo_path, repo_id, true)
                .await?;
            if report.files_processed == 0 {
                let mut result = UpdateResult::new(repo_id, RepoStatus::Empty)
                    .with_reason("no_indexable_files");
                result.commit = Some(origin_head.to_string());
                return Ok(result);
            }
            let mut result =
                UpdateResult::new(repo_id, RepoStatus::FullReingest).with_reason(reason);
            result.files_processed = report.files_processed as u32;
            result.docs_created = report.docs_stored as u32;
            result.commit = Some(origin_head.to_string());
            return Ok(result);
        }

        let mut result = UpdateResult::new(repo_id, RepoStatus::FullReingest).with_reason(reason);
        result.commit = Some(origin_head.to_string());
        Ok(result)
    }

    /// Batch-embed staged file and symbol documents.
    async fn embed_staged(
        &self,
        file_indices: &mut [FileIndex],
        symbol_indices: &mut [SymbolIndex],
    ) -> Result<()> {
        let mut texts = Vec::with_capacity(file_indices.len() + symbol_indices.len());
        for f in file_indices.iter() {
            texts.push(format!("{DOC_PREFIX}{}", f.embedding_input));
        }
        for s in symbol_indices.iter() {
            texts.push(format!(
                "{DOC_PREFIX}{}\n\nCode:\n{}",
                s.content, s.embedding_input
            ));
        }
        let vectors = embed_texts(
            self.embedder.as_ref(),
            &texts,
            self.pipeline.embed_concurrency,
        )
        .await?;
        let mut it = vectors.into_iter();
        for f in file_indices.iter_mut() {
            f.embedding = it.next();
        }
        for s in symbol_indices.iter_mut() {
            s.embedding = it.next();
        }
        Ok(())
    }

    /// Rebuild every module summary plus the repo summary from the store's
    /// current file set at the new commit.
    async fn regenerate_summaries(&self, repo_id: &str, commit_hash: &str) -> Result<()> {
        let stored = self.store.file_indices(repo_id).await?;
        if stored.is_empty() {
            return Ok(());
        }
        let mut files: Vec<FileIndex> = stored
            .iter()
            .filter_map(|doc| FileIndex::from_stored(doc, commit_hash))
            .collect();

        let (mut modules, mut repo_summary) = self
            .pipeline
            .aggregator
            .aggregate_all(&mut files, repo_id, commit_hash)
            .await;

        self.store.delete_summaries(repo_id).await?;

        // Embed the fresh summaries before writing.
        let mut texts: Vec<String> = modules
            .iter()
            .map(|m| format!("{DOC_PREFIX}{}", m.content))
            .collect();
        texts.push(format!("{DOC_PREFIX}{}", repo_summary.content));
        let vectors = embed_texts(
            self.embedder.as_ref(),
            &texts,
            self.pipeline.embed_concurrency,
        )
        .await?;
        let mut it = vectors.into_iter();
        for m in modules.iter_mut() {
            m.embedding = it.next();
        }
        repo_summary.embedding = it.next();

        for m in &modules {
            self.store.upsert(&m.document_id, &m.to_value()).await?;
        }
        self.store
            .upsert(&repo_summary.document_id, &repo_summary.to_value())
            .await?;
        Ok(())
    }
}

/// Fraction of the stored file set touched by a change set.
pub fn change_ratio(total_changed: usize, existing_files: u64) -> f64 {
    total_changed as f64 / existing_files.max(1) as f64
}

/// The updater runs a full re-ingest iff the repo has no stored commit or
/// the change ratio exceeds the threshold.
pub fn should_full_reingest(
    total_changed: usize,
    existing_files: u64,
    threshold: f64,
    has_stored_commit: bool,
) -> bool {
    !has_stored_commit || change_ratio(total_changed, existing_files) > threshold
}

fn finish(mut result: UpdateResult, started: Instant) -> UpdateResult {
    result.duration_seconds = started.elapsed().as_secs_f64();
    result
}

/// Splits changed paths into code and documentation files, applying the
/// skip rules to paths that still exist on disk.
fn partition_supported(files: &[String], repo_path: &Path) -> (Vec<String>, Vec<String>) {
    let mut code = Vec::new();
    let mut docs = Vec::new();

    for file in files {
        let ext = Path::new(file)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        let full: PathBuf = repo_path.join(file);
        if full.exists() && should_skip_file(&full) {
            continue;
        }
        if CODE_EXTENSIONS.contains(&ext.as_str()) {
            code.push(file.clone());
        } else if DOC_EXTENSIONS.contains(&ext.as_str()) {
            docs.push(file.clone());
        }
    }

    (code, docs)
}

/// All ancestor folder paths touched by the changed files (root included).
fn affected_modules<'a>(files: impl Iterator<Item = &'a String>) -> HashSet<String> {
    let mut modules = HashSet::new();
    for file in files {
        let mut folder = parent_folder(file);
        loop {
            modules.insert(folder.clone());
            if folder.is_empty() {
                break;
            }
            folder = folder.rsplit_once('/').map(|(p, _)| p.to_string()).unwrap_or_default();
        }
    }
    modules
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_by_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let files = vec![
            "src/app.py".to_string(),
            "README.md".to_string(),
            "logo.png".to_string(),
        ];
        let (code, docs) = partition_supported(&files, dir.path());
        assert_eq!(code, vec!["src/app.py"]);
        assert_eq!(docs, vec!["README.md"]);
    }

    #[test]
    fn affected_modules_includes_all_ancestors() {
        let files = vec!["a/b/c.py".to_string(), "top.py".to_string()];
        let modules = affected_modules(files.iter());
        assert!(modules.contains("a/b"));
        assert!(modules.contains("a"));
        assert!(modules.contains(""));
        assert_eq!(modules.len(), 3);
    }
}
