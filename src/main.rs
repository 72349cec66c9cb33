//! `codelore` — hierarchical code-knowledge ingestion worker.
//!
//! Default command runs the ingestion driver (incremental update or full
//! re-ingest per repository, under the global lock). `stats` and `analyze`
//! run criticality analysis over pydeps import dumps.
//!
//! Exit codes: 0 completed, 1 failed or interrupted, 2 lock held.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use doc_store::{
    CouchbaseStore, DocumentStore, EmbeddingBackend, EmbeddingConfig, EmbeddingProvider,
    LocalEmbedder, OllamaEmbedder, StoreConfig,
};
use ingest_core::criticality::{Analysis, DependencyGraph, compute_pagerank, load_multiple_pydeps};
use ingest_core::incremental::lifecycle::RepoLifecycle;
use ingest_core::incremental::significance::SignificanceGate;
use ingest_core::incremental::updater::IncrementalUpdater;
use ingest_core::pipeline::IngestPipeline;
use ingest_core::{IngestError, IngestionRunner, QualityTracker, RepoStatus, WorkerConfig};
use llm_service::{CircuitBreaker, LlmChunker, LlmConfig, ResponsesClient, Summarizer};

#[derive(Parser)]
#[command(name = "codelore", version, about = "Hierarchical code-knowledge ingestion worker")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Restrict the run to a single repository (owner/name).
    #[arg(long)]
    repo: Option<String>,

    /// Show what would change without writing to the store.
    #[arg(long)]
    dry_run: bool,

    /// Change-ratio threshold that trips a full re-ingest.
    #[arg(long)]
    threshold: Option<f64>,

    /// Disable LLM summarization (structural fallbacks only).
    #[arg(long)]
    no_llm: bool,

    /// What started this run.
    #[arg(long, default_value = "manual", value_parser = ["manual", "scheduled", "webhook"])]
    trigger: String,
}

#[derive(Subcommand)]
enum Command {
    /// Show import-graph statistics from pydeps dumps.
    Stats {
        /// Comma-separated pydeps JSON files.
        #[arg(long)]
        pydeps: String,
        /// Comma-separated module prefixes to keep.
        #[arg(long)]
        prefixes: String,
    },
    /// Compute criticality (PageRank) scores for a repository's modules.
    Analyze {
        /// Repository id the scores belong to (owner/name).
        #[arg(long)]
        repo: String,
        /// Comma-separated pydeps JSON files.
        #[arg(long)]
        pydeps: String,
        /// Comma-separated module prefixes to keep.
        #[arg(long)]
        prefixes: String,
        /// How many top modules to report.
        #[arg(long, default_value_t = 20)]
        top: usize,
        /// Optional JSON export path for the full score map.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    // .env is optional outside of container deployments.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let cfg = WorkerConfig::from_env();
    let _log_guards = init_telemetry(&cfg.log_dir);

    let code = match cli.command {
        Some(Command::Stats { pydeps, prefixes }) => cmd_stats(&pydeps, &prefixes),
        Some(Command::Analyze {
            repo,
            pydeps,
            prefixes,
            top,
            output,
        }) => cmd_analyze(&repo, &pydeps, &prefixes, top, output.as_deref()),
        None => cmd_run(cfg, cli.run),
    };
    std::process::exit(code);
}

/// Console layer plus rolling file sinks: `incremental.log` (daily),
/// `incremental.error.log` (ERROR only), and a per-invocation run log.
fn init_telemetry(log_dir: &Path) -> Vec<tracing_appender::non_blocking::WorkerGuard> {
    let _ = std::fs::create_dir_all(log_dir);
    let mut guards = Vec::new();

    let (main_file, g1) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(log_dir, "incremental.log"));
    let (error_file, g2) = tracing_appender::non_blocking(tracing_appender::rolling::daily(
        log_dir,
        "incremental.error.log",
    ));
    let run_log_name = format!(
        "run_{}.log",
        chrono_stamp()
    );
    let (run_file, g3) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, run_log_name));
    guards.extend([g1, g2, g3]);

    tracing_subscriber::registry()
        .with(llm_service::telemetry::env_filter("info"))
        .with(llm_service::telemetry::console_layer())
        .with(fmt::layer().with_ansi(false).with_writer(main_file))
        .with(fmt::layer().with_ansi(false).with_writer(run_file))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(error_file)
                .with_filter(EnvFilter::new("error")),
        )
        .init();

    guards
}

fn chrono_stamp() -> String {
    chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

fn cmd_run(mut cfg: WorkerConfig, args: RunArgs) -> i32 {
    if let Some(threshold) = args.threshold {
        cfg.threshold = threshold;
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start runtime: {e}");
            return 1;
        }
    };

    let continuous = std::env::var("RUN_MODE").as_deref() == Ok("continuous");
    let interval = std::env::var("INGEST_INTERVAL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(3600u64);

    runtime.block_on(async {
        loop {
            let code = run_once(&cfg, &args).await;
            if !continuous || code == 2 {
                return code;
            }
            if code == 1 {
                warn!("run did not complete cleanly; continuing in continuous mode");
            }
            info!(interval_secs = interval, "sleeping until next run");
            tokio::time::sleep(Duration::from_secs(interval)).await;
        }
    })
}

async fn run_once(cfg: &WorkerConfig, args: &RunArgs) -> i32 {
    // Store connection.
    let store: Arc<dyn DocumentStore> = match StoreConfig::from_env().and_then(CouchbaseStore::new)
    {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!(error = %e, "store configuration failed");
            return 1;
        }
    };

    // Embedding backend.
    let embed_cfg = match EmbeddingConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "embedding configuration failed");
            return 1;
        }
    };
    let embedder: Arc<dyn EmbeddingProvider> = match embed_cfg.backend {
        EmbeddingBackend::Local => Arc::new(LocalEmbedder::new(embed_cfg.dim)),
        EmbeddingBackend::Remote => Arc::new(OllamaEmbedder::new(&embed_cfg)),
    };

    // LLM surface; a missing config degrades to the no-LLM path.
    let breaker = Arc::new(CircuitBreaker::default());
    let quality = Arc::new(QualityTracker::new(Arc::clone(&breaker)));
    let (summarizer, chunker) = if args.no_llm {
        (None, None)
    } else {
        match LlmConfig::from_env()
            .map_err(llm_service::LlmError::from)
            .and_then(|llm_cfg| ResponsesClient::new(llm_cfg, Arc::clone(&breaker)))
        {
            Ok(client) => (
                Some(Arc::new(Summarizer::new(client.clone()))),
                Some(Arc::new(LlmChunker::new(client))),
            ),
            Err(e) => {
                warn!(error = %e, "LLM unavailable, running with structural fallbacks");
                (None, None)
            }
        }
    };
    let enable_llm = summarizer.is_some();

    let pipeline = IngestPipeline::new(
        Arc::new(code_indexer::CodeParser::new()),
        summarizer,
        chunker,
        Arc::clone(&quality),
        Arc::clone(&store),
        Arc::clone(&embedder),
        embed_cfg.concurrency,
        cfg.max_concurrent_files,
        args.dry_run,
    );
    let lifecycle = RepoLifecycle::new(cfg.clone(), Arc::clone(&store));
    let gate = SignificanceGate {
        enabled: enable_llm,
        ..SignificanceGate::default()
    };
    let updater = IncrementalUpdater::new(
        cfg.clone(),
        pipeline,
        lifecycle,
        gate,
        Arc::clone(&store),
        Arc::clone(&embedder),
        args.dry_run,
        enable_llm,
    );

    let runner = IngestionRunner::new(cfg.clone(), Arc::clone(&store), &args.trigger, args.dry_run);
    match runner.run(&updater, args.repo.as_deref()).await {
        Ok(outcome) => {
            print_summary(&outcome);
            if outcome.completed() { 0 } else { 1 }
        }
        Err(IngestError::LockHeld { pid, started }) => {
            eprintln!(
                "{} another ingestion is running (pid: {}, started: {})",
                "lock held:".red().bold(),
                pid.unwrap_or_else(|| "unknown".into()),
                started.unwrap_or_else(|| "unknown".into()),
            );
            2
        }
        Err(e) => {
            error!(error = %e, "run failed");
            1
        }
    }
}

fn print_summary(outcome: &ingest_core::RunOutcome) {
    let record = &outcome.record;
    let count = |status: RepoStatus| {
        outcome
            .results
            .iter()
            .filter(|r| r.status == status)
            .count()
    };

    println!();
    println!("{}", "ingestion summary".bold());
    println!("  run:           {}", record.run_id);
    println!("  status:        {}", record.status);
    println!("  cloned:        {}", record.repos_cloned);
    println!("  updated:       {}", count(RepoStatus::Updated));
    println!("  full reingest: {}", count(RepoStatus::FullReingest));
    println!("  skipped:       {}", count(RepoStatus::Skipped));
    println!("  excluded:      {}", count(RepoStatus::Excluded));
    println!("  empty:         {}", count(RepoStatus::Empty));
    println!("  deleted:       {}", count(RepoStatus::Deleted));
    let errors = count(RepoStatus::Error);
    if errors > 0 {
        println!("  errors:        {}", errors.to_string().red());
        for result in outcome.results.iter().filter(|r| r.status == RepoStatus::Error) {
            println!(
                "    - {}: {}",
                result.repo_id,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    } else {
        println!("  errors:        0");
    }
    println!("  files:         {} processed, {} deleted", record.files_processed, record.files_deleted);
    println!("  duration:      {:.1}s", record.duration_seconds);
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn load_graph(pydeps: &str, prefixes: &str) -> Result<(DependencyGraph, Vec<String>), i32> {
    let files = split_csv(pydeps);
    let prefixes = split_csv(prefixes);
    let paths: Vec<&Path> = files.iter().map(Path::new).collect();

    let map = match load_multiple_pydeps(&paths) {
        Ok(map) => map,
        Err(e) => {
            eprintln!("failed to load pydeps: {e}");
            return Err(1);
        }
    };
    println!("Loaded {} total modules (including external)", map.len());
    Ok((DependencyGraph::from_pydeps(&map, &prefixes), prefixes))
}

fn cmd_stats(pydeps: &str, prefixes: &str) -> i32 {
    let (graph, prefixes) = match load_graph(pydeps, prefixes) {
        Ok(g) => g,
        Err(code) => return code,
    };
    println!("Prefixes: {prefixes:?}");
    println!("Graph: {} nodes, {} edges", graph.node_count(), graph.edge_count());
    0
}

fn cmd_analyze(repo: &str, pydeps: &str, prefixes: &str, top: usize, output: Option<&Path>) -> i32 {
    let (graph, prefixes) = match load_graph(pydeps, prefixes) {
        Ok(g) => g,
        Err(code) => return code,
    };

    let scores = compute_pagerank(&graph);
    let analysis = Analysis::new(&graph, &scores, top);

    println!("Repository: {repo}");
    println!("Graph: {} nodes, {} edges", analysis.node_count, analysis.edge_count);
    println!("\nTop {} modules by criticality:", analysis.top_modules.len());
    for (i, (module, score)) in analysis.top_modules.iter().enumerate() {
        println!("  {:>2}. {module:<50} {score:.5}", i + 1);
    }

    if let Some(path) = output {
        let export = serde_json::json!({
            "repo_id": repo,
            "prefixes": prefixes,
            "stats": {
                "node_count": analysis.node_count,
                "edge_count": analysis.edge_count,
            },
            "scores": scores,
        });
        match serde_json::to_string_pretty(&export)
            .map_err(std::io::Error::other)
            .and_then(|body| std::fs::write(path, body))
        {
            Ok(()) => println!("\nExported scores to {}", path.display()),
            Err(e) => {
                eprintln!("failed to export: {e}");
                return 1;
            }
        }
    }
    0
}
