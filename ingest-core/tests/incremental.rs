//! Incremental updater scenarios against real git repositories: skip on no
//! change, surgical update, threshold-tripped full re-ingest, deletion
//! handling, and lock mutual exclusion.
//!
//! Tests build a local "origin" repository, clone a working copy, and drive
//! the updater with the in-memory store and local embeddings (no LLM).

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use doc_store::{DocumentStore, LocalEmbedder, MemoryStore};
use ingest_core::incremental::lifecycle::RepoLifecycle;
use ingest_core::incremental::significance::SignificanceGate;
use ingest_core::incremental::updater::{IncrementalUpdater, should_full_reingest};
use ingest_core::pipeline::IngestPipeline;
use ingest_core::{QualityTracker, RepoStatus, WorkerConfig};
use serde_json::Value;

const REPO_ID: &str = "acme/widget";

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|o| o.status.success())
}

fn git(cwd: &Path, args: &[&str]) {
    let out = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("GIT_AUTHOR_NAME", "test")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "test")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .output()
        .expect("git runs");
    assert!(
        out.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
}

fn commit_all(origin: &Path, message: &str) {
    git(origin, &["add", "-A"]);
    git(origin, &["commit", "-m", message]);
}

struct Fixture {
    _dir: tempfile::TempDir,
    origin: PathBuf,
    work: PathBuf,
    repos: PathBuf,
    store: Arc<MemoryStore>,
}

fn setup() -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let origin = dir.path().join("origin");
    let repos = dir.path().join("repos");
    std::fs::create_dir_all(&origin).unwrap();
    std::fs::create_dir_all(&repos).unwrap();

    git(&origin, &["-c", "init.defaultBranch=main", "init"]);
    std::fs::write(
        origin.join("a.py"),
        "def alpha():\n    x = 1\n    y = 2\n    z = 3\n    return x + y + z\n",
    )
    .unwrap();
    std::fs::write(
        origin.join("b.py"),
        "def beta():\n    a = 'one'\n    b = 'two'\n    c = 'three'\n    return a + b + c\n",
    )
    .unwrap();
    commit_all(&origin, "initial");

    let work = repos.join("acme_widget");
    let origin_str = origin.to_string_lossy().into_owned();
    let work_str = work.to_string_lossy().into_owned();
    git(dir.path(), &["clone", &origin_str, &work_str]);

    Fixture {
        origin,
        work,
        repos,
        store: Arc::new(MemoryStore::new()),
        _dir: dir,
    }
}

fn make_updater(fixture: &Fixture, threshold: f64) -> IncrementalUpdater {
    let cfg = WorkerConfig {
        repos_path: fixture.repos.clone(),
        threshold,
        ..WorkerConfig::default()
    };
    let quality = Arc::new(QualityTracker::default());
    let embedder = Arc::new(LocalEmbedder::new(64));
    let pipeline = IngestPipeline::new(
        Arc::new(code_indexer::CodeParser::new()),
        None,
        None,
        quality,
        fixture.store.clone() as Arc<dyn DocumentStore>,
        embedder.clone(),
        4,
        4,
        false,
    );
    let lifecycle = RepoLifecycle::new(cfg.clone(), fixture.store.clone() as Arc<dyn DocumentStore>);
    IncrementalUpdater::new(
        cfg,
        pipeline,
        lifecycle,
        SignificanceGate::default(),
        fixture.store.clone() as Arc<dyn DocumentStore>,
        embedder,
        false,
        false,
    )
}

fn file_indices_for(store: &MemoryStore, path: &str) -> Vec<Value> {
    store
        .all()
        .into_iter()
        .filter(|d| {
            d.get("type").and_then(Value::as_str) == Some("file_index")
                && d.get("file_path").and_then(Value::as_str) == Some(path)
        })
        .collect()
}

fn repo_summary_commit(store: &MemoryStore) -> Option<String> {
    store
        .all()
        .into_iter()
        .find(|d| d.get("type").and_then(Value::as_str) == Some("repo_summary"))
        .and_then(|d| d.get("commit_hash").and_then(Value::as_str).map(String::from))
}

#[tokio::test]
async fn update_lifecycle_scenarios() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let fixture = setup();
    // Generous threshold so the small fixture stays on the incremental path.
    let updater = make_updater(&fixture, 2.0);

    // New repo: no stored commit means full re-ingest.
    let result = updater.process_repo(REPO_ID, &fixture.work).await.unwrap();
    assert_eq!(result.status, RepoStatus::FullReingest);
    assert_eq!(result.reason.as_deref(), Some("new_repo"));
    let c1 = repo_summary_commit(&fixture.store).expect("repo summary written");

    // Unchanged origin: skipped without touching the store.
    let docs_before = fixture.store.len();
    let result = updater.process_repo(REPO_ID, &fixture.work).await.unwrap();
    assert_eq!(result.status, RepoStatus::Skipped);
    assert_eq!(result.reason.as_deref(), Some("no_changes"));
    assert_eq!(fixture.store.len(), docs_before);

    // A cosmetic edit keeps the structural summary identical, so the gate
    // stops ancestor propagation: file docs move to the new commit while
    // the repo summary stays at the old one.
    std::fs::write(
        fixture.origin.join("a.py"),
        "# touched\ndef alpha():\n    x = 1\n    y = 2\n    z = 3\n    return x + y + z\n",
    )
    .unwrap();
    commit_all(&fixture.origin, "cosmetic tweak");

    let result = updater.process_repo(REPO_ID, &fixture.work).await.unwrap();
    assert_eq!(result.status, RepoStatus::Updated);
    assert_eq!(result.files_processed, 1);
    let c2 = result.commit.clone().expect("commit recorded");
    assert_ne!(c1, c2);

    // Deletion atomicity: exactly one file_index for the path, at c2.
    let a_docs = file_indices_for(&fixture.store, "a.py");
    assert_eq!(a_docs.len(), 1);
    assert_eq!(a_docs[0]["commit_hash"].as_str().unwrap(), c2);
    // Ancestors untouched.
    assert_eq!(repo_summary_commit(&fixture.store).unwrap(), c1);

    // A new file is always significant: ancestors regenerate at the new
    // commit.
    std::fs::write(
        fixture.origin.join("c.py"),
        "def gamma():\n    total = 0\n    for i in range(10):\n        total += i\n    return total\n",
    )
    .unwrap();
    commit_all(&fixture.origin, "add gamma module");

    let result = updater.process_repo(REPO_ID, &fixture.work).await.unwrap();
    assert_eq!(result.status, RepoStatus::Updated);
    let c3 = result.commit.clone().unwrap();
    assert_eq!(repo_summary_commit(&fixture.store).unwrap(), c3);

    // Threshold trip: a low-threshold updater re-ingests everything.
    std::fs::write(
        fixture.origin.join("a.py"),
        "def alpha_two():\n    p = 10\n    q = 20\n    r = 30\n    return p * q * r\n",
    )
    .unwrap();
    std::fs::write(
        fixture.origin.join("b.py"),
        "def beta_two():\n    a = 'x'\n    b = 'y'\n    c = 'z'\n    return (a + b + c).upper()\n",
    )
    .unwrap();
    commit_all(&fixture.origin, "rewrite both modules");

    let strict = make_updater(&fixture, 0.05);
    let result = strict.process_repo(REPO_ID, &fixture.work).await.unwrap();
    assert_eq!(result.status, RepoStatus::FullReingest);
    let reason = result.reason.clone().unwrap();
    assert!(
        reason.starts_with("threshold_exceeded ("),
        "unexpected reason: {reason}"
    );
    let c4 = result.commit.clone().unwrap();
    assert_eq!(repo_summary_commit(&fixture.store).unwrap(), c4);

    // Deleting a file removes its documents and regenerates ancestors.
    std::fs::remove_file(fixture.origin.join("b.py")).unwrap();
    commit_all(&fixture.origin, "drop beta");

    let result = updater.process_repo(REPO_ID, &fixture.work).await.unwrap();
    assert_eq!(result.status, RepoStatus::Updated);
    assert_eq!(result.files_deleted, 1);
    assert!(file_indices_for(&fixture.store, "b.py").is_empty());
    let c5 = result.commit.clone().unwrap();
    assert_eq!(repo_summary_commit(&fixture.store).unwrap(), c5);
}

#[test]
fn threshold_policy_full_reingest_rule() {
    // full_reingest iff changed/N > threshold OR no stored commit.
    assert!(should_full_reingest(0, 100, 0.05, false));
    assert!(!should_full_reingest(5, 100, 0.05, true));
    assert!(should_full_reingest(6, 100, 0.05, true));
    assert!(should_full_reingest(30, 200, 0.05, true)); // 15% > 5%
    assert!(!should_full_reingest(1, 200, 0.05, true));
    // Zero stored files count as one to avoid dividing by zero.
    assert!(should_full_reingest(1, 0, 0.05, true));
}

#[tokio::test]
async fn lock_excludes_concurrent_runs() {
    use fs2::FileExt;
    use ingest_core::{IngestError, IngestionRunner};

    let dir = tempfile::tempdir().expect("tempdir");
    let repos = dir.path().join("repos");
    std::fs::create_dir_all(&repos).unwrap();
    let cfg = WorkerConfig {
        repos_path: repos,
        lock_path: dir.path().join("logs/ingestion.lock"),
        log_dir: dir.path().join("logs"),
        ..WorkerConfig::default()
    };

    let store = Arc::new(MemoryStore::new());
    let fixture_store = store.clone() as Arc<dyn DocumentStore>;
    let quality = Arc::new(QualityTracker::default());
    let embedder = Arc::new(LocalEmbedder::new(32));
    let pipeline = IngestPipeline::new(
        Arc::new(code_indexer::CodeParser::new()),
        None,
        None,
        quality,
        fixture_store.clone(),
        embedder.clone(),
        2,
        2,
        false,
    );
    let lifecycle = RepoLifecycle::new(cfg.clone(), fixture_store.clone());
    let updater = IncrementalUpdater::new(
        cfg.clone(),
        pipeline,
        lifecycle,
        SignificanceGate::default(),
        fixture_store.clone(),
        embedder,
        false,
        false,
    );
    let runner = IngestionRunner::new(cfg.clone(), fixture_store, "manual", false);

    // A foreign process holds the lock.
    std::fs::create_dir_all(cfg.lock_path.parent().unwrap()).unwrap();
    let holder = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&cfg.lock_path)
        .unwrap();
    holder.try_lock_exclusive().unwrap();

    let err = runner.run(&updater, None).await.expect_err("lock must exclude");
    assert!(matches!(err, IngestError::LockHeld { .. }));

    // Release and run: an empty canonical set completes cleanly.
    fs2::FileExt::unlock(&holder).unwrap();
    drop(holder);
    let outcome = runner.run(&updater, None).await.expect("run succeeds");
    assert!(outcome.completed());
    assert!(outcome.results.is_empty());
}
