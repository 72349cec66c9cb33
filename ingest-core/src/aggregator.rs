//! Bottom-up aggregation: file summaries → module summaries → repo summary.
//!
//! The folder tree is closed under ancestors (intermediate directories with
//! no direct files still get a module document), then processed deepest
//! first so a module is built only after all of its descendants exist.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use llm_service::Summarizer;
use tracing::{debug, info};

use crate::quality::QualityTracker;
use crate::schemas::{
    EnrichmentLevel, FileIndex, ModuleSummary, QualityInfo, RepoSummary, VersionInfo,
    module_doc_id, module_path_label, repo_doc_id,
};

/// Child summaries included per module prompt.
const MAX_MODULE_CONTEXT: usize = 15;
/// Module summaries included in the repo prompt.
const MAX_REPO_CONTEXT: usize = 20;
/// Filenames that mark a file as important for `key_files`.
const KEY_FILE_NAMES: &[&str] = &[
    "models.py",
    "views.py",
    "urls.py",
    "index.ts",
    "index.js",
    "main.py",
    "api.py",
    "routes.py",
    "handlers.py",
    "config.py",
    "settings.py",
    "__init__.py",
];
/// Files above this line count are important regardless of name.
const KEY_FILE_MIN_LINES: u32 = 200;

/// Aggregates file summaries into module and repo summaries.
pub struct BottomUpAggregator {
    summarizer: Option<Arc<Summarizer>>,
    quality: Arc<QualityTracker>,
}

impl BottomUpAggregator {
    pub fn new(summarizer: Option<Arc<Summarizer>>, quality: Arc<QualityTracker>) -> Self {
        Self { summarizer, quality }
    }

    /// Build the complete module hierarchy plus the repo summary.
    ///
    /// Also rewires `parent_id` on each direct file to its module document.
    pub async fn aggregate_all(
        &self,
        file_indices: &mut [FileIndex],
        repo_id: &str,
        commit_hash: &str,
    ) -> (Vec<ModuleSummary>, RepoSummary) {
        // Group file positions by parent folder.
        let mut folder_files: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, file) in file_indices.iter().enumerate() {
            folder_files.entry(parent_folder(&file.file_path)).or_default().push(i);
        }

        // Close the folder set under path prefixes.
        let mut folders: HashSet<String> = folder_files.keys().cloned().collect();
        for folder in folders.clone() {
            let mut current = folder;
            while let Some(parent) = parent_of(&current) {
                folders.insert(parent.clone());
                current = parent;
            }
            folders.insert(String::new());
        }

        // Deepest first, lexicographic within a depth.
        let mut ordered: Vec<String> = folders.into_iter().collect();
        ordered.sort_by(|a, b| depth(b).cmp(&depth(a)).then_with(|| a.cmp(b)));

        let repo_id_doc = repo_doc_id(repo_id, commit_hash);
        let mut modules: BTreeMap<String, ModuleSummary> = BTreeMap::new();

        for folder in ordered {
            let direct: Vec<usize> = folder_files.get(&folder).cloned().unwrap_or_default();
            let children: Vec<String> = modules
                .keys()
                .filter(|other| is_immediate_child(&folder, other))
                .cloned()
                .collect();

            if direct.is_empty() && children.is_empty() {
                continue;
            }

            let parent_id = match parent_of(&folder) {
                Some(parent) if !parent.is_empty() => module_doc_id(repo_id, &parent, commit_hash),
                Some(_) | None => repo_id_doc.clone(),
            };

            let module = self
                .module_summary(
                    &folder,
                    &direct,
                    &children,
                    &modules,
                    file_indices,
                    repo_id,
                    commit_hash,
                    parent_id,
                )
                .await;

            for &i in &direct {
                file_indices[i].parent_id = module.document_id.clone();
            }
            debug!(module = %module.module_path, files = direct.len(), "module summarized");
            modules.insert(folder, module);
        }

        let module_list: Vec<ModuleSummary> = modules.into_values().collect();
        let repo_summary = self
            .repo_summary(repo_id, commit_hash, &module_list, file_indices)
            .await;

        info!(
            repo = repo_id,
            modules = module_list.len(),
            files = file_indices.len(),
            "aggregation complete"
        );
        (module_list, repo_summary)
    }

    #[allow(clippy::too_many_arguments)]
    async fn module_summary(
        &self,
        folder: &str,
        direct: &[usize],
        child_folders: &[String],
        modules: &BTreeMap<String, ModuleSummary>,
        file_indices: &[FileIndex],
        repo_id: &str,
        commit_hash: &str,
        parent_id: String,
    ) -> ModuleSummary {
        let module_path = module_path_label(folder).to_string();

        let mut summaries: Vec<&str> = direct
            .iter()
            .map(|&i| file_indices[i].content.as_str())
            .filter(|s| !s.is_empty())
            .collect();
        summaries.extend(
            child_folders
                .iter()
                .filter_map(|f| modules.get(f))
                .map(|m| m.content.as_str())
                .filter(|s| !s.is_empty()),
        );

        let (content, enrichment) = match self
            .summarizer
            .as_ref()
            .filter(|_| self.quality.llm_available() && !summaries.is_empty())
        {
            Some(summarizer) => {
                let context: Vec<&str> = summaries.iter().take(MAX_MODULE_CONTEXT).copied().collect();
                match summarizer
                    .summarize_module(&module_path, &context.join("\n\n---\n\n"), repo_id)
                    .await
                {
                    Ok(enrichment) => {
                        self.quality.record_llm_call(true, enrichment.tokens);
                        (enrichment.summary, EnrichmentLevel::LlmSummary)
                    }
                    Err(e) => {
                        debug!(module = %module_path, error = %e, "LLM module summary failed");
                        self.quality.record_llm_call(false, 0);
                        (
                            fallback_module_summary(
                                &module_path,
                                direct,
                                file_indices,
                                child_folders,
                            ),
                            EnrichmentLevel::Basic,
                        )
                    }
                }
            }
            None => (
                fallback_module_summary(&module_path, direct, file_indices, child_folders),
                EnrichmentLevel::Basic,
            ),
        };

        let mut children_ids: Vec<String> = direct
            .iter()
            .map(|&i| file_indices[i].document_id.clone())
            .collect();
        children_ids.extend(
            child_folders
                .iter()
                .filter_map(|f| modules.get(f))
                .map(|m| m.document_id.clone()),
        );

        self.quality.record_module_created();

        ModuleSummary {
            document_id: module_doc_id(repo_id, folder, commit_hash),
            repo_id: repo_id.to_string(),
            module_path,
            commit_hash: commit_hash.to_string(),
            content,
            embedding: None,
            file_count: direct.len() as u32,
            key_files: identify_key_files(direct, file_indices),
            parent_id,
            children_ids,
            quality: QualityInfo {
                enrichment_level: enrichment,
                llm_available: self.quality.llm_available(),
                summary_source: "aggregated_from_files".into(),
                ..QualityInfo::default()
            },
            version: VersionInfo::now(),
        }
    }

    async fn repo_summary(
        &self,
        repo_id: &str,
        commit_hash: &str,
        modules: &[ModuleSummary],
        file_indices: &[FileIndex],
    ) -> RepoSummary {
        let module_contents: Vec<&str> = modules
            .iter()
            .map(|m| m.content.as_str())
            .filter(|s| !s.is_empty())
            .collect();

        let (content, enrichment) = match self
            .summarizer
            .as_ref()
            .filter(|_| self.quality.llm_available() && !module_contents.is_empty())
        {
            Some(summarizer) => {
                let context: Vec<&str> =
                    module_contents.iter().take(MAX_REPO_CONTEXT).copied().collect();
                match summarizer
                    .summarize_repo(repo_id, &context.join("\n\n---\n\n"))
                    .await
                {
                    Ok(enrichment) => {
                        self.quality.record_llm_call(true, enrichment.tokens);
                        (enrichment.summary, EnrichmentLevel::LlmSummary)
                    }
                    Err(e) => {
                        debug!(repo = repo_id, error = %e, "LLM repo summary failed");
                        self.quality.record_llm_call(false, 0);
                        (fallback_repo_summary(repo_id, modules), EnrichmentLevel::Basic)
                    }
                }
            }
            None => (fallback_repo_summary(repo_id, modules), EnrichmentLevel::Basic),
        };

        let mut languages: BTreeMap<String, u32> = BTreeMap::new();
        for f in file_indices.iter() {
            *languages.entry(f.language.clone()).or_default() += 1;
        }

        let top_level: Vec<&ModuleSummary> = modules
            .iter()
            .filter(|m| !m.module_path.contains('/') && !m.module_path.is_empty())
            .collect();

        RepoSummary {
            document_id: repo_doc_id(repo_id, commit_hash),
            repo_id: repo_id.to_string(),
            commit_hash: commit_hash.to_string(),
            content,
            embedding: None,
            total_files: file_indices.len() as u32,
            total_lines: file_indices.iter().map(|f| u64::from(f.line_count)).sum(),
            languages,
            tech_stack: detect_tech_stack(file_indices),
            modules: top_level.iter().map(|m| m.module_path.clone()).collect(),
            children_ids: top_level.iter().map(|m| m.document_id.clone()).collect(),
            quality: QualityInfo {
                enrichment_level: enrichment,
                llm_available: self.quality.llm_available(),
                summary_source: "aggregated_from_modules".into(),
                ..QualityInfo::default()
            },
            version: VersionInfo::now(),
        }
    }
}

/// Lexical parent folder of a file path ("" for root files).
pub fn parent_folder(file_path: &str) -> String {
    Path::new(file_path)
        .parent()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default()
}

fn parent_of(folder: &str) -> Option<String> {
    if folder.is_empty() {
        return None;
    }
    Some(folder.rsplit_once('/').map(|(p, _)| p.to_string()).unwrap_or_default())
}

/// Depth in path components: "" → 0, "a" → 1, "a/b" → 2.
fn depth(folder: &str) -> usize {
    if folder.is_empty() {
        0
    } else {
        folder.split('/').count()
    }
}

fn is_immediate_child(folder: &str, other: &str) -> bool {
    if other.is_empty() || other == folder {
        return false;
    }
    if folder.is_empty() {
        return !other.contains('/');
    }
    other
        .strip_prefix(folder)
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|rest| !rest.contains('/'))
}

fn fallback_module_summary(
    module_path: &str,
    direct: &[usize],
    file_indices: &[FileIndex],
    child_folders: &[String],
) -> String {
    let mut out = format!("Module: {module_path}/");

    if !direct.is_empty() {
        out.push_str(&format!("\n\nFiles ({}):", direct.len()));
        for &i in direct.iter().take(10) {
            let file = &file_indices[i];
            let name = Path::new(&file.file_path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.file_path.clone());
            let preview: String = file
                .content
                .lines()
                .next()
                .unwrap_or("")
                .chars()
                .take(60)
                .collect();
            out.push_str(&format!("\n- {name}: {preview}"));
        }
    }

    if !child_folders.is_empty() {
        out.push_str(&format!("\n\nSubmodules ({}):", child_folders.len()));
        for folder in child_folders.iter().take(5) {
            out.push_str(&format!("\n- {folder}/"));
        }
    }

    out
}

fn fallback_repo_summary(repo_id: &str, modules: &[ModuleSummary]) -> String {
    let mut out = format!("Repository: {repo_id}");
    let top: Vec<&ModuleSummary> = modules
        .iter()
        .filter(|m| !m.module_path.contains('/'))
        .collect();
    if !top.is_empty() {
        out.push_str(&format!("\n\nModules ({}):", top.len()));
        for m in top.iter().take(10) {
            out.push_str(&format!("\n- {}/: {} files", m.module_path, m.file_count));
        }
    }
    out
}

fn identify_key_files(direct: &[usize], file_indices: &[FileIndex]) -> Vec<String> {
    let mut key_files = Vec::new();
    for &i in direct {
        let file = &file_indices[i];
        let name = Path::new(&file.file_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if KEY_FILE_NAMES.contains(&name.as_str()) || file.line_count > KEY_FILE_MIN_LINES {
            key_files.push(name);
        }
    }
    key_files.truncate(10);
    key_files
}

/// Tech stack from imports and well-known manifest file names.
fn detect_tech_stack(file_indices: &[FileIndex]) -> Vec<String> {
    let mut tech: HashSet<&'static str> = HashSet::new();

    for file in file_indices {
        let path = file.file_path.to_lowercase();
        let imports = file.imports.join(" ").to_lowercase();

        if imports.contains("django") {
            tech.insert("django");
        }
        if imports.contains("flask") {
            tech.insert("flask");
        }
        if imports.contains("fastapi") {
            tech.insert("fastapi");
        }
        if imports.contains("react") || path.contains("jsx") {
            tech.insert("react");
        }
        if imports.contains("vue") || path.contains(".vue") {
            tech.insert("vue");
        }
        if path.contains("svelte") {
            tech.insert("svelte");
        }
        if imports.contains("sqlalchemy") {
            tech.insert("sqlalchemy");
        }
        if imports.contains("psycopg") || imports.contains("postgresql") {
            tech.insert("postgresql");
        }
        if imports.contains("redis") {
            tech.insert("redis");
        }
        if imports.contains("celery") {
            tech.insert("celery");
        }
        if path.contains("requirements.txt") || path.contains("pyproject.toml") {
            tech.insert("python");
        }
        if path.contains("package.json") {
            tech.insert("nodejs");
        }
        if path.contains("dockerfile") {
            tech.insert("docker");
        }
    }

    let mut out: Vec<String> = tech.into_iter().map(String::from).collect();
    out.sort();
    out.truncate(15);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::{file_doc_id, QualityInfo, VersionInfo};

    fn file(path: &str, content: &str, lines: u32) -> FileIndex {
        FileIndex {
            document_id: file_doc_id("acme/widget", path, "c0ffee000000"),
            repo_id: "acme/widget".into(),
            file_path: path.into(),
            commit_hash: "c0ffee000000".into(),
            content: content.into(),
            embedding: None,
            line_count: lines,
            language: "python".into(),
            imports: vec![],
            symbols: vec![],
            parent_id: String::new(),
            children_ids: vec![],
            quality: QualityInfo::default(),
            version: VersionInfo::now(),
            embedding_input: String::new(),
        }
    }

    #[tokio::test]
    async fn builds_tree_with_intermediate_folders() {
        let aggregator =
            BottomUpAggregator::new(None, Arc::new(crate::quality::QualityTracker::default()));
        let mut files = vec![
            file("main.py", "entry point", 50),
            file("app/api/routes.py", "routes", 120),
        ];
        let (modules, repo) = aggregator
            .aggregate_all(&mut files, "acme/widget", "c0ffee000000")
            .await;

        let paths: Vec<&str> = modules.iter().map(|m| m.module_path.as_str()).collect();
        // `app` has no direct files but must exist as an intermediate module.
        assert!(paths.contains(&"(root)"));
        assert!(paths.contains(&"app"));
        assert!(paths.contains(&"app/api"));

        // app/api parents to app; app parents to the repo document.
        let api = modules.iter().find(|m| m.module_path == "app/api").unwrap();
        let app = modules.iter().find(|m| m.module_path == "app").unwrap();
        assert_eq!(api.parent_id, app.document_id);
        assert_eq!(app.parent_id, repo.document_id);
        assert!(app.children_ids.contains(&api.document_id));

        // Direct files were rewired to their module.
        let root = modules.iter().find(|m| m.module_path == "(root)").unwrap();
        assert_eq!(files[0].parent_id, root.document_id);
        assert_eq!(files[1].parent_id, api.document_id);

        // Repo summary counts and children.
        assert_eq!(repo.total_files, 2);
        assert_eq!(repo.total_lines, 170);
        assert_eq!(repo.languages.get("python"), Some(&2));
        assert!(repo.children_ids.contains(&app.document_id));
    }

    #[test]
    fn key_files_by_name_and_size() {
        let files = vec![
            file("app/models.py", "", 10),
            file("app/huge.py", "", 500),
            file("app/tiny.py", "", 5),
        ];
        let idx: Vec<usize> = (0..files.len()).collect();
        let keys = identify_key_files(&idx, &files);
        assert!(keys.contains(&"models.py".to_string()));
        assert!(keys.contains(&"huge.py".to_string()));
        assert!(!keys.contains(&"tiny.py".to_string()));
    }

    #[test]
    fn tech_stack_from_imports_and_paths() {
        let mut f = file("app/views.py", "", 10);
        f.imports = vec!["django.db".into(), "redis".into()];
        let stack = detect_tech_stack(&[f]);
        assert_eq!(stack, vec!["django", "redis"]);
    }

    #[test]
    fn immediate_child_logic() {
        assert!(is_immediate_child("", "app"));
        assert!(is_immediate_child("app", "app/api"));
        assert!(!is_immediate_child("", "app/api"));
        assert!(!is_immediate_child("app", "app/api/v1"));
        assert!(!is_immediate_child("app", "application"));
    }
}
