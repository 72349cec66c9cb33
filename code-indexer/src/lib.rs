//! Structural code parsing for the ingestion pipeline.
//!
//! Maps file content to an ordered list of [`types::SymbolRef`]s per
//! language, with a regex fallback when a structural parser is unavailable,
//! plus the underchunk heuristics and the file discovery/skip rules.

pub mod ast;
pub mod errors;
pub mod imports;
pub mod types;
pub mod underchunk;
pub mod util;

pub use ast::router::CodeParser;
pub use errors::{Error, Result};
pub use types::{Language, MethodRef, SymbolKind, SymbolRef};
pub use underchunk::is_underchunked;
