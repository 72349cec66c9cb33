//! Worker configuration from environment variables.

use std::path::PathBuf;

use tracing::warn;

/// Prefixes GitHub issues for its token families.
const GITHUB_TOKEN_PREFIXES: &[&str] = &["ghp_", "gho_", "ghu_", "ghs_", "ghr_", "github_pat_"];

/// Knobs of the run driver and incremental updater.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Directory holding repo working copies, named `<owner>_<name>`.
    pub repos_path: PathBuf,
    /// GitHub token resolved via `GIT_TOKEN_ENV_NAME` indirection.
    pub github_token: Option<String>,
    /// Repo ids that are never processed (status `excluded`).
    pub excluded_repos: Vec<String>,
    /// Bounded per-repo file concurrency.
    pub max_concurrent_files: usize,
    /// Change-ratio threshold that trips a full re-ingest.
    pub threshold: f64,
    /// Global lock file path.
    pub lock_path: PathBuf,
    /// Log directory (rotating logs, per-run log, KPI dashboard).
    pub log_dir: PathBuf,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            repos_path: PathBuf::from("/repos"),
            github_token: None,
            excluded_repos: Vec::new(),
            max_concurrent_files: 4,
            threshold: 0.05,
            lock_path: PathBuf::from("logs/ingestion.lock"),
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl WorkerConfig {
    /// Build from environment variables.
    ///
    /// Recognized vars:
    /// - `REPOS_PATH` (default `/repos`)
    /// - `GIT_TOKEN_ENV_NAME` — the *name* of the env var holding the GitHub
    ///   token (default `GITHUB_TOKEN`); warns when the resolved token does
    ///   not carry a known GitHub prefix
    /// - `EXCLUDED_REPOS` — comma-separated repo ids
    /// - `MAX_CONCURRENT_FILES` (default 4)
    /// - `INGEST_THRESHOLD` (default 0.05)
    /// - `INGEST_LOCK_PATH` (default `<log_dir>/ingestion.lock`)
    /// - `INGEST_LOG_DIR` (default `logs`)
    pub fn from_env() -> Self {
        let repos_path =
            PathBuf::from(std::env::var("REPOS_PATH").unwrap_or_else(|_| "/repos".into()));

        let github_token = resolve_github_token();

        let excluded_repos = std::env::var("EXCLUDED_REPOS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let max_concurrent_files = std::env::var("MAX_CONCURRENT_FILES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(4);

        let threshold = std::env::var("INGEST_THRESHOLD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.05);

        let log_dir =
            PathBuf::from(std::env::var("INGEST_LOG_DIR").unwrap_or_else(|_| "logs".into()));
        let lock_path = std::env::var("INGEST_LOCK_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| log_dir.join("ingestion.lock"));

        Self {
            repos_path,
            github_token,
            excluded_repos,
            max_concurrent_files,
            threshold,
            lock_path,
            log_dir,
        }
    }

    /// `owner/name` → `<repos_path>/owner_name`.
    pub fn repo_id_to_path(&self, repo_id: &str) -> PathBuf {
        self.repos_path.join(repo_id.replace('/', "_"))
    }
}

/// Resolves the GitHub token through the `GIT_TOKEN_ENV_NAME` indirection
/// and sanity-checks the prefix.
pub fn resolve_github_token() -> Option<String> {
    let var_name =
        std::env::var("GIT_TOKEN_ENV_NAME").unwrap_or_else(|_| "GITHUB_TOKEN".to_string());
    let token = std::env::var(&var_name).ok().filter(|t| !t.trim().is_empty())?;

    if !GITHUB_TOKEN_PREFIXES.iter().any(|p| token.starts_with(p)) {
        warn!(
            var = %var_name,
            "token does not look like a GitHub token (expected ghp_/gho_/ghu_/ghs_/ghr_/github_pat_ prefix)"
        );
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_id_maps_to_underscored_dir() {
        let cfg = WorkerConfig {
            repos_path: PathBuf::from("/repos"),
            ..WorkerConfig::default()
        };
        assert_eq!(
            cfg.repo_id_to_path("acme/widget"),
            PathBuf::from("/repos/acme_widget")
        );
    }
}
