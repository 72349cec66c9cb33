//! Git operations for the ingestion pipeline.
//!
//! Shells out to the `git` binary with pinned argument vectors; every
//! invocation runs with `GIT_TERMINAL_PROMPT=0` and `GIT_ASKPASS=echo` so a
//! missing credential fails fast instead of prompting.

pub mod changes;
pub mod errors;
pub mod ops;

pub use changes::ChangeSet;
pub use errors::GitError;
pub use ops::GitOps;
