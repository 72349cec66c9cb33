//! Import graph construction and PageRank scoring.
//!
//! Edges point importer → imported, so score flows toward the modules
//! everything else depends on.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::criticality::pydeps::PydepsMap;

const DAMPING: f64 = 0.85;
const MAX_ITERATIONS: usize = 100;
const CONVERGENCE: f64 = 1e-6;

/// Directed import graph over project modules.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    pub nodes: Vec<String>,
    index: HashMap<String, usize>,
    /// Outgoing edges per node (importer → imported).
    out_edges: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Build from a pydeps dump, keeping only modules under the given
    /// prefixes.
    pub fn from_pydeps(pydeps: &PydepsMap, prefixes: &[String]) -> Self {
        let keep = |name: &str| prefixes.is_empty() || prefixes.iter().any(|p| name.starts_with(p.as_str()));

        let mut graph = Self::default();
        for name in pydeps.keys().filter(|n| keep(n)) {
            graph.add_node(name);
        }
        for (name, module) in pydeps.iter().filter(|(n, _)| keep(n)) {
            let from = graph.index[name];
            for target in module.imports.iter().filter(|t| keep(t)) {
                if let Some(&to) = graph.index.get(target) {
                    graph.out_edges[from].push(to);
                }
            }
        }
        debug!(
            nodes = graph.nodes.len(),
            edges = graph.edge_count(),
            "dependency graph built"
        );
        graph
    }

    fn add_node(&mut self, name: &str) {
        if self.index.contains_key(name) {
            return;
        }
        self.index.insert(name.to_string(), self.nodes.len());
        self.nodes.push(name.to_string());
        self.out_edges.push(Vec::new());
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.out_edges.iter().map(Vec::len).sum()
    }
}

/// Standard PageRank with uniform teleport.
pub fn compute_pagerank(graph: &DependencyGraph) -> BTreeMap<String, f64> {
    let n = graph.node_count();
    if n == 0 {
        return BTreeMap::new();
    }

    let uniform = 1.0 / n as f64;
    let mut scores = vec![uniform; n];

    for iteration in 0..MAX_ITERATIONS {
        let mut next = vec![(1.0 - DAMPING) * uniform; n];
        let mut dangling = 0.0;

        for (node, edges) in graph.out_edges.iter().enumerate() {
            if edges.is_empty() {
                dangling += scores[node];
                continue;
            }
            let share = DAMPING * scores[node] / edges.len() as f64;
            for &target in edges {
                next[target] += share;
            }
        }
        // Dangling mass redistributes uniformly.
        let dangling_share = DAMPING * dangling * uniform;
        for value in &mut next {
            *value += dangling_share;
        }

        let delta: f64 = scores
            .iter()
            .zip(&next)
            .map(|(a, b)| (a - b).abs())
            .sum();
        scores = next;
        if delta < CONVERGENCE {
            debug!(iteration, "pagerank converged");
            break;
        }
    }

    graph
        .nodes
        .iter()
        .cloned()
        .zip(scores)
        .collect()
}

/// Summary of a scored graph for reporting.
#[derive(Debug)]
pub struct Analysis {
    pub node_count: usize,
    pub edge_count: usize,
    /// `(module, score)` sorted by descending score.
    pub top_modules: Vec<(String, f64)>,
}

impl Analysis {
    pub fn new(graph: &DependencyGraph, scores: &BTreeMap<String, f64>, top_n: usize) -> Self {
        let mut ranked: Vec<(String, f64)> =
            scores.iter().map(|(k, v)| (k.clone(), *v)).collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(top_n);
        Self {
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            top_modules: ranked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criticality::pydeps::PydepsModule;

    fn module(name: &str, imports: &[&str]) -> (String, PydepsModule) {
        (
            name.to_string(),
            PydepsModule {
                name: name.to_string(),
                path: None,
                imports: imports.iter().map(|s| s.to_string()).collect(),
                imported_by: vec![],
            },
        )
    }

    #[test]
    fn heavily_imported_module_ranks_highest() {
        let pydeps: PydepsMap = [
            module("app.a", &["app.core"]),
            module("app.b", &["app.core"]),
            module("app.c", &["app.core", "app.a"]),
            module("app.core", &[]),
            module("external.lib", &["app.core"]),
        ]
        .into_iter()
        .collect();

        let graph = DependencyGraph::from_pydeps(&pydeps, &["app".to_string()]);
        // external.lib filtered out by prefix.
        assert_eq!(graph.node_count(), 4);

        let scores = compute_pagerank(&graph);
        let analysis = Analysis::new(&graph, &scores, 2);
        assert_eq!(analysis.top_modules[0].0, "app.core");

        let total: f64 = scores.values().sum();
        assert!((total - 1.0).abs() < 1e-3);
    }

    #[test]
    fn empty_graph_is_fine() {
        let graph = DependencyGraph::default();
        assert!(compute_pagerank(&graph).is_empty());
    }
}
