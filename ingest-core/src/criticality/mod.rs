//! Criticality analysis over pydeps-style import graphs.
//!
//! Loads one or more pydeps JSON dumps, filters modules to the project's
//! prefixes, and ranks them with PageRank so operators can see which
//! modules the codebase leans on hardest.

pub mod pagerank;
pub mod pydeps;

pub use pagerank::{Analysis, DependencyGraph, compute_pagerank};
pub use pydeps::{load_multiple_pydeps, load_pydeps_json};
