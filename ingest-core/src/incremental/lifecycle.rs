//! Repository lifecycle: canonical-set discovery, cloning, orphan cleanup.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use doc_store::DocumentStore;
use git_engine::GitOps;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::errors::Result;

/// Name of the newline-delimited repo list config file, looked up next to
/// the repos directory.
const REPOS_CONFIG_FILE: &str = "repos_to_ingest.txt";

/// Manages repository discovery and lifecycle.
pub struct RepoLifecycle {
    cfg: WorkerConfig,
    store: Arc<dyn DocumentStore>,
    http: reqwest::Client,
    git: GitOps,
}

impl RepoLifecycle {
    pub fn new(cfg: WorkerConfig, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            cfg,
            store,
            http: reqwest::Client::new(),
            git: GitOps,
        }
    }

    pub fn repo_id_to_path(&self, repo_id: &str) -> PathBuf {
        self.cfg.repo_id_to_path(repo_id)
    }

    /// The canonical list of repositories that should be indexed.
    ///
    /// Sources in order of preference: GitHub API (when a token is set),
    /// the `repos_to_ingest.txt` config file, repos already on disk.
    pub async fn canonical_repo_list(&self) -> Vec<String> {
        if self.cfg.github_token.is_some() {
            let repos = self.repos_from_github().await;
            if !repos.is_empty() {
                info!(count = repos.len(), "canonical set from GitHub API");
                return repos;
            }
        }

        let config_file = self
            .cfg
            .repos_path
            .parent()
            .map(|p| p.join(REPOS_CONFIG_FILE))
            .unwrap_or_else(|| PathBuf::from(REPOS_CONFIG_FILE));
        if config_file.exists() {
            let repos = repos_from_config(&config_file);
            if !repos.is_empty() {
                info!(count = repos.len(), "canonical set from config file");
                return repos;
            }
        }

        warn!("no GitHub token or config file, using repos on disk");
        self.discover_repos_on_disk()
    }

    /// Paginated listing of the authenticated user's repositories.
    async fn repos_from_github(&self) -> Vec<String> {
        let Some(token) = self.cfg.github_token.as_deref() else {
            return Vec::new();
        };

        #[derive(Deserialize)]
        struct Repo {
            full_name: String,
        }

        let mut repos = Vec::new();
        let mut page = 1u32;
        loop {
            let url = format!("https://api.github.com/user/repos?per_page=100&page={page}");
            let resp = match self
                .http
                .get(&url)
                .header("Authorization", format!("token {token}"))
                .header("Accept", "application/vnd.github.v3+json")
                .header("User-Agent", "codelore-ingest")
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    error!(error = %e, "GitHub API request failed");
                    return Vec::new();
                }
            };
            if !resp.status().is_success() {
                error!(status = %resp.status(), "GitHub API error");
                return Vec::new();
            }
            let batch: Vec<Repo> = match resp.json().await {
                Ok(b) => b,
                Err(e) => {
                    error!(error = %e, "GitHub API decode failed");
                    return Vec::new();
                }
            };
            if batch.is_empty() {
                break;
            }
            repos.extend(batch.into_iter().map(|r| r.full_name));
            page += 1;
        }
        repos
    }

    /// Repos currently on disk, by directory naming convention
    /// (`owner_name` → `owner/name`).
    pub fn discover_repos_on_disk(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.cfg.repos_path) else {
            error!(path = %self.cfg.repos_path.display(), "repos path does not exist");
            return Vec::new();
        };

        let mut repos = Vec::new();
        for entry in entries.filter_map(|e| e.ok()) {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !entry.path().is_dir() {
                continue;
            }
            if let Some((owner, repo)) = name.split_once('_') {
                repos.push(format!("{owner}/{repo}"));
            }
        }
        repos.sort();
        repos
    }

    /// All repo ids present in the store.
    pub async fn repos_in_store(&self) -> HashSet<String> {
        match self.store.distinct_repo_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, "failed to query repos from store");
                HashSet::new()
            }
        }
    }

    /// Shallow-clone a new repository into its canonical path.
    pub async fn clone_repo(&self, repo_id: &str) -> Result<()> {
        let target = self.repo_id_to_path(repo_id);
        self.git
            .clone_shallow(repo_id, &target, self.cfg.github_token.as_deref())
            .await?;
        Ok(())
    }

    /// Delete every stored document for an orphaned repo and remove its
    /// working copy.
    pub async fn delete_repo(&self, repo_id: &str, dry_run: bool) -> u64 {
        if dry_run {
            info!(repo = repo_id, "[dry run] would delete all docs and the working copy");
            return 0;
        }

        let deleted = match self.store.delete_repo_docs(repo_id).await {
            Ok(n) => n,
            Err(e) => {
                error!(repo = repo_id, error = %e, "failed to delete repo docs");
                0
            }
        };

        let path = self.repo_id_to_path(repo_id);
        if path.exists() {
            if let Err(e) = std::fs::remove_dir_all(&path) {
                error!(path = %path.display(), error = %e, "failed to delete working copy");
            } else {
                debug!(path = %path.display(), "working copy removed");
            }
        }

        deleted
    }
}

fn repos_from_config(path: &std::path::Path) -> Vec<String> {
    let Ok(content) = std::fs::read_to_string(path) else {
        error!(path = %path.display(), "failed to read repos config file");
        return Vec::new();
    };
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            // Inline comments after the repo id.
            let repo_id = line.split('#').next().unwrap_or("").trim();
            if repo_id.contains('/') {
                Some(repo_id.to_string())
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_parsing_skips_comments() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(REPOS_CONFIG_FILE);
        std::fs::write(
            &path,
            "# main repos\nacme/widget\nacme/gadget # the new one\n\nnot-a-repo\n",
        )
        .unwrap();
        let repos = repos_from_config(&path);
        assert_eq!(repos, vec!["acme/widget", "acme/gadget"]);
    }

    #[test]
    fn disk_discovery_maps_underscores() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("acme_widget")).unwrap();
        std::fs::create_dir(dir.path().join(".hidden")).unwrap();
        std::fs::create_dir(dir.path().join("noslash")).unwrap();

        let lifecycle = RepoLifecycle::new(
            WorkerConfig {
                repos_path: dir.path().to_path_buf(),
                ..WorkerConfig::default()
            },
            Arc::new(doc_store::MemoryStore::new()),
        );
        assert_eq!(lifecycle.discover_repos_on_disk(), vec!["acme/widget"]);
    }
}
