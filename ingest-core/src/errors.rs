//! Unified error type for the ingestion core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("store error: {0}")]
    Store(#[from] doc_store::StoreError),

    #[error("git error: {0}")]
    Git(#[from] git_engine::GitError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),

    /// Another run holds the global lock. Carries whatever the lock file
    /// disclosed about the holder.
    #[error("another ingestion is running (pid: {pid:?}, started: {started:?})")]
    LockHeld {
        pid: Option<String>,
        started: Option<String>,
    },
}

pub type Result<T> = std::result::Result<T, IngestError>;
