//! Core of the hierarchical code-knowledge ingestion pipeline.
//!
//! Per repository the pipeline produces a four-level hierarchy — symbol →
//! file → module → repo — where every level holds a natural-language summary
//! plus an embedding. The run driver reconciles the canonical repository
//! set, then either incrementally updates each repo (touched files and their
//! ancestor summaries) or re-ingests it from scratch when the change ratio
//! trips the threshold.

pub mod aggregator;
pub mod config;
pub mod criticality;
pub mod docs;
pub mod errors;
pub mod file_processor;
pub mod incremental;
pub mod kpi;
pub mod pipeline;
pub mod quality;
pub mod schemas;

pub use config::WorkerConfig;
pub use errors::IngestError;
pub use incremental::models::{RepoStatus, UpdateResult};
pub use incremental::runner::{IngestionRunner, RunOutcome};
pub use quality::QualityTracker;
