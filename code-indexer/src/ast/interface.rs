//! Provider capability implemented by each language parser.

use crate::errors::Result;
use crate::types::SymbolRef;

/// Maps file content to an ordered list of symbols.
///
/// Providers are selected once at startup and held in a dispatch table keyed
/// by language; a failing provider falls back to the regex variant.
pub trait AstProvider: Send + Sync {
    fn parse(&self, content: &str) -> Result<Vec<SymbolRef>>;
}
