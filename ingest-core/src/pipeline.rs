//! Full re-ingest orchestration for one repository:
//! discover → process files (bounded concurrency) → aggregate bottom-up →
//! batch-embed → store.
//!
//! Each file is a unit of atomicity; a failing file is recorded and skipped
//! without aborting the repo.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use code_indexer::CodeParser;
use code_indexer::util::fs_scan::{discover_code_files, discover_doc_files};
use doc_store::{DOC_PREFIX, DocumentStore, EmbeddingProvider, embed_texts};
use git_engine::GitOps;
use llm_service::{LlmChunker, Summarizer};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::docs::DocumentIngester;
use crate::errors::Result;
use crate::file_processor::FileProcessor;
use crate::quality::QualityTracker;
use crate::schemas::{FileIndex, ModuleSummary, RepoSummary, SymbolIndex};
use crate::aggregator::BottomUpAggregator;

/// Upsert progress log interval.
const STORE_LOG_EVERY: usize = 100;

/// Outcome of a full repository ingest.
#[derive(Debug, Default, Clone)]
pub struct IngestReport {
    pub files_discovered: usize,
    pub files_processed: usize,
    pub symbols_indexed: usize,
    pub modules_created: usize,
    pub doc_chunks_created: usize,
    pub docs_stored: usize,
}

/// Wires the per-file processor, aggregator, embedder, and store together.
pub struct IngestPipeline {
    pub processor: Arc<FileProcessor>,
    pub aggregator: BottomUpAggregator,
    pub quality: Arc<QualityTracker>,
    pub store: Arc<dyn DocumentStore>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub embed_concurrency: usize,
    pub max_concurrent_files: usize,
    pub dry_run: bool,
}

impl IngestPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        parser: Arc<CodeParser>,
        summarizer: Option<Arc<Summarizer>>,
        chunker: Option<Arc<LlmChunker>>,
        quality: Arc<QualityTracker>,
        store: Arc<dyn DocumentStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        embed_concurrency: usize,
        max_concurrent_files: usize,
        dry_run: bool,
    ) -> Self {
        let processor = Arc::new(FileProcessor::new(
            parser,
            summarizer.clone(),
            chunker,
            Arc::clone(&quality),
        ));
        let aggregator = BottomUpAggregator::new(summarizer, Arc::clone(&quality));
        Self {
            processor,
            aggregator,
            quality,
            store,
            embedder,
            embed_concurrency,
            max_concurrent_files,
            dry_run,
        }
    }

    /// Ingest a complete repository at its current HEAD.
    ///
    /// When `delete_existing` is set, every stored document for the repo id
    /// is removed before the new commit's documents are written.
    pub async fn ingest_repository(
        &self,
        repo_path: &Path,
        repo_id: &str,
        delete_existing: bool,
    ) -> Result<IngestReport> {
        info!(repo = repo_id, "starting full ingestion");
        self.quality.start_run(repo_id);

        let commit_hash = GitOps
            .rev_parse(repo_path, "HEAD")
            .await
            .unwrap_or_else(|e| {
                warn!(repo = repo_id, error = %e, "could not determine commit hash");
                "unknown".to_string()
            });

        if delete_existing && !self.dry_run {
            let deleted = self.store.delete_repo_docs(repo_id).await?;
            info!(repo = repo_id, deleted, "cleaned up existing documents");
        }

        let mut report = IngestReport::default();

        // Phase 1: discovery.
        let files = discover_code_files(repo_path);
        report.files_discovered = files.len();
        info!(repo = repo_id, files = files.len(), "discovered code files");
        if files.is_empty() {
            self.quality.end_run();
            return Ok(report);
        }

        // Phase 2: bounded-parallel file processing.
        let (mut file_indices, mut symbol_indices) = self
            .process_files(&files, repo_path, repo_id, &commit_hash)
            .await;
        report.files_processed = file_indices.len();
        report.symbols_indexed = symbol_indices.len();
        if file_indices.is_empty() {
            warn!(repo = repo_id, "no files were successfully processed");
            self.quality.end_run();
            return Ok(report);
        }

        // Phase 3: bottom-up aggregation.
        let (mut modules, mut repo_summary) = self
            .aggregator
            .aggregate_all(&mut file_indices, repo_id, &commit_hash)
            .await;
        report.modules_created = modules.len();

        // Phase 4: embeddings for every document.
        self.embed_all(&mut file_indices, &mut symbol_indices, &mut modules, &mut repo_summary)
            .await?;

        // Phase 5: store.
        report.docs_stored = self
            .store_documents(&file_indices, &symbol_indices, &modules, &repo_summary)
            .await?;

        // Supplementary documentation pipeline.
        let doc_ingester = DocumentIngester::new(
            Arc::clone(&self.store),
            Arc::clone(&self.embedder),
            self.dry_run,
        );
        for doc_path in discover_doc_files(repo_path) {
            report.doc_chunks_created += doc_ingester
                .process_doc(&doc_path, repo_path, repo_id)
                .await
                .unwrap_or(0);
        }

        self.quality.end_run();
        info!(
            repo = repo_id,
            files = report.files_processed,
            symbols = report.symbols_indexed,
            modules = report.modules_created,
            doc_chunks = report.doc_chunks_created,
            "full ingestion complete"
        );
        Ok(report)
    }

    /// Runs the file processor over all files with a semaphore bound.
    pub async fn process_files(
        &self,
        files: &[PathBuf],
        repo_path: &Path,
        repo_id: &str,
        commit_hash: &str,
    ) -> (Vec<FileIndex>, Vec<SymbolIndex>) {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_files.max(1)));
        let total = files.len();

        let mut handles = Vec::with_capacity(total);
        for file in files.iter().cloned() {
            let semaphore = Arc::clone(&semaphore);
            let processor = Arc::clone(&self.processor);
            let quality = Arc::clone(&self.quality);
            let repo_path = repo_path.to_path_buf();
            let repo_id = repo_id.to_string();
            let commit_hash = commit_hash.to_string();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await.ok()?;
                let relative = file
                    .strip_prefix(&repo_path)
                    .unwrap_or(&file)
                    .to_string_lossy()
                    .into_owned();
                match processor
                    .process(&file, &repo_path, &repo_id, &commit_hash, "")
                    .await
                {
                    Ok(result) => result,
                    Err(e) => {
                        error!(file = %relative, error = %e, "file processing failed");
                        quality.record_file_failed(&relative, &e.to_string());
                        None
                    }
                }
            }));
        }

        let mut file_indices = Vec::new();
        let mut symbol_indices = Vec::new();
        for (i, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(Some((file_doc, symbol_docs))) => {
                    file_indices.push(file_doc);
                    symbol_indices.extend(symbol_docs);
                }
                Ok(None) => {}
                Err(e) => error!(index = i, error = %e, "file task panicked"),
            }
        }

        info!(
            processed = file_indices.len(),
            of = total,
            symbols = symbol_indices.len(),
            "file processing phase done"
        );
        (file_indices, symbol_indices)
    }

    /// Generates embeddings for every document, batch-wise and in order.
    pub async fn embed_all(
        &self,
        file_indices: &mut [FileIndex],
        symbol_indices: &mut [SymbolIndex],
        modules: &mut [ModuleSummary],
        repo_summary: &mut RepoSummary,
    ) -> Result<()> {
        let mut texts: Vec<String> = Vec::new();

        for f in file_indices.iter() {
            let source = if f.embedding_input.is_empty() {
                &f.content
            } else {
                &f.embedding_input
            };
            texts.push(format!("{DOC_PREFIX}{source}"));
        }
        for s in symbol_indices.iter() {
            let source = if s.embedding_input.is_empty() {
                s.content.clone()
            } else {
                format!("{}\n\nCode:\n{}", s.content, s.embedding_input)
            };
            texts.push(format!("{DOC_PREFIX}{source}"));
        }
        for m in modules.iter() {
            texts.push(format!("{DOC_PREFIX}{}", m.content));
        }
        texts.push(format!("{DOC_PREFIX}{}", repo_summary.content));

        info!(total = texts.len(), "generating embeddings");
        let vectors = embed_texts(self.embedder.as_ref(), &texts, self.embed_concurrency).await?;

        let mut it = vectors.into_iter();
        for f in file_indices.iter_mut() {
            f.embedding = it.next();
            self.quality.record_embedding();
        }
        for s in symbol_indices.iter_mut() {
            s.embedding = it.next();
            self.quality.record_embedding();
        }
        for m in modules.iter_mut() {
            m.embedding = it.next();
            self.quality.record_embedding();
        }
        repo_summary.embedding = it.next();
        self.quality.record_embedding();

        Ok(())
    }

    /// Upserts every document; failures are logged per document.
    pub async fn store_documents(
        &self,
        file_indices: &[FileIndex],
        symbol_indices: &[SymbolIndex],
        modules: &[ModuleSummary],
        repo_summary: &RepoSummary,
    ) -> Result<usize> {
        if self.dry_run {
            info!("dry run, skipping storage");
            return Ok(0);
        }

        let mut stored = 0usize;
        let docs = file_indices
            .iter()
            .map(|f| (f.document_id.clone(), f.to_value()))
            .chain(symbol_indices.iter().map(|s| (s.document_id.clone(), s.to_value())))
            .chain(modules.iter().map(|m| (m.document_id.clone(), m.to_value())))
            .chain(std::iter::once((
                repo_summary.document_id.clone(),
                repo_summary.to_value(),
            )));

        for (doc_id, value) in docs {
            match self.store.upsert(&doc_id, &value).await {
                Ok(()) => {
                    stored += 1;
                    if stored % STORE_LOG_EVERY == 0 {
                        info!(stored, "upsert progress");
                    }
                }
                Err(e) => error!(doc_id = %doc_id, error = %e, "upsert failed"),
            }
        }

        info!(
            files = file_indices.len(),
            symbols = symbol_indices.len(),
            modules = modules.len(),
            "documents stored"
        );
        Ok(stored)
    }
}
