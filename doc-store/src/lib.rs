//! Document store and embedding facade used by the ingestion pipeline.
//!
//! The store contract is deliberately narrow: idempotent upserts keyed by
//! content-derived document ids, a handful of parameterised queries, and the
//! predicate deletes the incremental updater needs. One implementation talks
//! to a Couchbase-style N1QL query service over HTTP; an in-memory variant
//! backs the test suite.

pub mod config;
pub mod embed;
pub mod embed_pool;
pub mod errors;
pub mod memory;
pub mod store;

pub use config::{EmbeddingBackend, EmbeddingConfig, StoreConfig};
pub use embed::{DOC_PREFIX, EmbeddingProvider, QUERY_PREFIX, local::LocalEmbedder, ollama::OllamaEmbedder};
pub use embed_pool::embed_texts;
pub use errors::StoreError;
pub use memory::MemoryStore;
pub use store::{CouchbaseStore, DocumentStore};
