use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("git {op} failed (exit {code:?}): {stderr}")]
    CommandFailed {
        op: &'static str,
        code: Option<i32>,
        stderr: String,
    },

    #[error("git {op} timed out after {secs}s")]
    Timeout { op: &'static str, secs: u64 },

    #[error("io error running git {op}: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, GitError>;
