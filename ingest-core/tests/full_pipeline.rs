//! End-to-end hierarchy invariants for the full ingestion pipeline, run
//! against the in-memory store, the local embedding backend, and no LLM
//! (structural fallbacks only, as when the circuit is open for a whole run).

use std::path::Path;
use std::sync::Arc;

use doc_store::{DocumentStore, LocalEmbedder, MemoryStore};
use ingest_core::QualityTracker;
use ingest_core::pipeline::IngestPipeline;
use ingest_core::schemas::{file_doc_id, module_doc_id, repo_doc_id, symbol_doc_id};
use serde_json::Value;

const REPO_ID: &str = "acme/widget";

fn make_pipeline(store: Arc<MemoryStore>) -> IngestPipeline {
    IngestPipeline::new(
        Arc::new(code_indexer::CodeParser::new()),
        None,
        None,
        Arc::new(QualityTracker::default()),
        store,
        Arc::new(LocalEmbedder::new(64)),
        4,
        4,
        false,
    )
}

fn write_fixture_repo(root: &Path) {
    std::fs::create_dir_all(root.join("app/api")).unwrap();
    std::fs::write(
        root.join("main.py"),
        "\"\"\"Entry point.\"\"\"\n\ndef main():\n    setup()\n    configure()\n    run()\n    teardown()\n    return 0\n\ndef tiny():\n    pass\n",
    )
    .unwrap();
    std::fs::write(
        root.join("app/api/routes.py"),
        "class Router:\n    \"\"\"Dispatches requests.\"\"\"\n\n    def dispatch(self, request):\n        target = self.resolve(request.path)\n        handler = self.handlers[target]\n        response = handler(request)\n        return response\n\n    def resolve(self, path):\n        return path.strip('/')\n",
    )
    .unwrap();
    std::fs::write(
        root.join("README.md"),
        format!("# Widget\n\n{}\n", "An overview paragraph with enough words to survive the chunk floor. ".repeat(5)),
    )
    .unwrap();
}

fn docs_of_type<'a>(docs: &'a [Value], kind: &str) -> Vec<&'a Value> {
    docs.iter()
        .filter(|d| d.get("type").and_then(Value::as_str) == Some(kind))
        .collect()
}

#[tokio::test]
async fn hierarchy_invariants_hold_end_to_end() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_fixture_repo(dir.path());

    let store = Arc::new(MemoryStore::new());
    let pipeline = make_pipeline(Arc::clone(&store));
    let report = pipeline
        .ingest_repository(dir.path(), REPO_ID, false)
        .await
        .expect("ingest ok");

    assert_eq!(report.files_processed, 2);
    assert!(report.doc_chunks_created >= 1);

    let docs = store.all();
    let files = docs_of_type(&docs, "file_index");
    let symbols = docs_of_type(&docs, "symbol_index");
    let modules = docs_of_type(&docs, "module_summary");
    let repos = docs_of_type(&docs, "repo_summary");

    assert_eq!(files.len(), 2);
    assert_eq!(repos.len(), 1);
    // No git repo here, so the working tree is indexed at "unknown".
    let commit = "unknown";

    // Repo summary identity and stats.
    let repo = repos[0];
    assert_eq!(
        repo.get("document_id").and_then(Value::as_str).unwrap(),
        repo_doc_id(REPO_ID, commit)
    );
    assert_eq!(repo["metadata"]["total_files"], 2);

    // Every symbol's parent is its file document; its own id matches the
    // deterministic identifier function.
    for symbol in &symbols {
        let path = symbol["file_path"].as_str().unwrap();
        let name = symbol["symbol_name"].as_str().unwrap();
        assert_eq!(
            symbol["document_id"].as_str().unwrap(),
            symbol_doc_id(REPO_ID, path, name, commit)
        );
        assert_eq!(
            symbol["parent_id"].as_str().unwrap(),
            file_doc_id(REPO_ID, path, commit)
        );
        assert!(symbol["embedding"].is_array(), "symbol missing embedding");
    }

    // children_ids ⇔ significant flag on the file's symbol list.
    for file in &files {
        let children: Vec<&str> = file["children_ids"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        let path = file["file_path"].as_str().unwrap();
        for symbol_meta in file["metadata"]["symbols"].as_array().unwrap() {
            let name = symbol_meta["name"].as_str().unwrap();
            let id = symbol_doc_id(REPO_ID, path, name, commit);
            let lines = symbol_meta["lines"].as_array().unwrap();
            let line_count = lines[1].as_u64().unwrap() - lines[0].as_u64().unwrap() + 1;
            assert_eq!(
                symbol_meta["significant"].as_bool().unwrap(),
                line_count >= 5,
                "significance flag wrong for {name}"
            );
            assert_eq!(
                children.contains(&id.as_str()),
                line_count >= 5,
                "children_ids mismatch for {name}"
            );
        }

        // File parents to its lexical folder's module.
        let folder = Path::new(path)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        assert_eq!(
            file["parent_id"].as_str().unwrap(),
            module_doc_id(REPO_ID, &folder, commit)
        );
    }

    // Modules form a tree rooted at the repo document.
    let module_ids: Vec<&str> = modules
        .iter()
        .map(|m| m["document_id"].as_str().unwrap())
        .collect();
    for module in &modules {
        let parent = module["parent_id"].as_str().unwrap();
        assert!(
            parent == repo_doc_id(REPO_ID, commit) || module_ids.contains(&parent),
            "module parent {parent} is neither repo nor another module"
        );
    }
    // `app` exists purely as an intermediate ancestor.
    assert!(modules.iter().any(|m| m["module_path"] == "app"));

    // Doc chunks respect the 100-char floor.
    for chunk in docs_of_type(&docs, "document") {
        assert!(chunk["content"].as_str().unwrap().trim().len() >= 100);
    }
}

#[tokio::test]
async fn reingest_is_idempotent_for_ids() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_fixture_repo(dir.path());

    let store = Arc::new(MemoryStore::new());
    let pipeline = make_pipeline(Arc::clone(&store));

    pipeline
        .ingest_repository(dir.path(), REPO_ID, false)
        .await
        .expect("first ingest");
    let first: std::collections::BTreeSet<String> = store
        .all()
        .iter()
        .filter_map(|d| d.get("document_id").and_then(Value::as_str).map(String::from))
        .collect();

    pipeline
        .ingest_repository(dir.path(), REPO_ID, true)
        .await
        .expect("second ingest");
    let second: std::collections::BTreeSet<String> = store
        .all()
        .iter()
        .filter_map(|d| d.get("document_id").and_then(Value::as_str).map(String::from))
        .collect();

    assert_eq!(first, second, "same tree at same commit must produce identical ids");
}

#[tokio::test]
async fn empty_repo_reports_zero_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(MemoryStore::new());
    let pipeline = make_pipeline(Arc::clone(&store));
    let report = pipeline
        .ingest_repository(dir.path(), REPO_ID, false)
        .await
        .expect("ingest ok");
    assert_eq!(report.files_discovered, 0);
    assert!(store.is_empty());
}
