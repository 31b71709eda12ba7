//! Structural graph metrics, independent of homology.
//!
//! - Density over distinct directed pairs: E / (V·(V-1))
//! - Average local clustering of the undirected simple graph
//! - Weakly and strongly connected component counts
//! - Degree centrality summary

use super::types::WindowedGraph;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Degree-centrality summary; centralities are distinct neighbours / (n-1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CentralitySummary {
    pub max_degree_centrality: f64,
    pub mean_degree_centrality: f64,
    /// Largest share of accounts sending to a single account.
    pub max_in_degree_centrality: f64,
    /// Largest share of accounts receiving from a single account.
    pub max_out_degree_centrality: f64,
}

/// Structural metrics of a windowed graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuralMetrics {
    pub node_count: usize,
    pub edge_count: usize,
    pub density: f64,
    pub clustering_coefficient: f64,
    pub num_connected_components: usize,
    pub num_strongly_connected_components: usize,
    /// (in + out degree summed over nodes) / nodes, parallel edges included.
    pub average_degree: f64,
    pub centrality: CentralitySummary,
}

impl StructuralMetrics {
    /// Compute all metrics; an empty graph yields all zeros.
    pub fn compute(graph: &WindowedGraph) -> Self {
        let n = graph.node_count();
        if n == 0 {
            return Self::default();
        }

        let undirected = graph.undirected_neighbors();
        let successors = graph.successors();
        let predecessors = graph.predecessors();

        let directed_pairs: usize = successors.iter().map(|s| s.len()).sum();
        let density = if n > 1 {
            directed_pairs as f64 / (n * (n - 1)) as f64
        } else {
            0.0
        };

        let clustering_coefficient = (0..n)
            .map(|v| local_clustering(&undirected, v))
            .sum::<f64>()
            / n as f64;

        Self {
            node_count: n,
            edge_count: graph.edge_count(),
            density,
            clustering_coefficient,
            num_connected_components: count_components(n, &undirected),
            num_strongly_connected_components: count_strong_components(&successors, &predecessors),
            average_degree: 2.0 * graph.edge_count() as f64 / n as f64,
            centrality: centrality_summary(&undirected, &successors, &predecessors),
        }
    }

    /// Metrics in a fixed order, for baseline statistics.
    pub fn as_vec(&self) -> Vec<f64> {
        vec![
            self.node_count as f64,
            self.edge_count as f64,
            self.density,
            self.clustering_coefficient,
            self.num_connected_components as f64,
            self.num_strongly_connected_components as f64,
            self.average_degree,
            self.centrality.max_degree_centrality,
            self.centrality.mean_degree_centrality,
            self.centrality.max_in_degree_centrality,
            self.centrality.max_out_degree_centrality,
        ]
    }

    /// Names matching [`StructuralMetrics::as_vec`].
    pub const NAMES: [&'static str; 11] = [
        "node_count",
        "edge_count",
        "density",
        "clustering_coefficient",
        "num_connected_components",
        "num_strongly_connected_components",
        "average_degree",
        "max_degree_centrality",
        "mean_degree_centrality",
        "max_in_degree_centrality",
        "max_out_degree_centrality",
    ];
}

fn local_clustering(adj: &[BTreeSet<usize>], v: usize) -> f64 {
    let neighbors: Vec<usize> = adj[v].iter().copied().collect();
    let k = neighbors.len();
    if k < 2 {
        return 0.0;
    }
    let mut links = 0usize;
    for (i, &a) in neighbors.iter().enumerate() {
        for &b in &neighbors[i + 1..] {
            if adj[a].contains(&b) {
                links += 1;
            }
        }
    }
    2.0 * links as f64 / (k * (k - 1)) as f64
}

/// Weakly connected components via union-find.
fn count_components(n: usize, adj: &[BTreeSet<usize>]) -> usize {
    let mut parent: Vec<usize> = (0..n).collect();
    let mut rank = vec![0usize; n];

    fn find(parent: &mut [usize], i: usize) -> usize {
        let mut root = i;
        while parent[root] != root {
            root = parent[root];
        }
        let mut cur = i;
        while parent[cur] != root {
            let next = parent[cur];
            parent[cur] = root;
            cur = next;
        }
        root
    }

    let mut components = n;
    for (u, neighbors) in adj.iter().enumerate() {
        for &v in neighbors.range(u + 1..) {
            let ru = find(&mut parent, u);
            let rv = find(&mut parent, v);
            if ru == rv {
                continue;
            }
            if rank[ru] < rank[rv] {
                parent[ru] = rv;
            } else if rank[ru] > rank[rv] {
                parent[rv] = ru;
            } else {
                parent[rv] = ru;
                rank[ru] += 1;
            }
            components -= 1;
        }
    }
    components
}

/// Strongly connected components via iterative Kosaraju.
fn count_strong_components(
    successors: &[BTreeSet<usize>],
    predecessors: &[BTreeSet<usize>],
) -> usize {
    let n = successors.len();
    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);

    // First pass: finish order on the forward graph.
    for start in 0..n {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        let mut stack: Vec<(usize, Vec<usize>)> =
            vec![(start, successors[start].iter().copied().collect())];
        while let Some(top) = stack.last_mut() {
            let node = top.0;
            match top.1.pop() {
                Some(next) => {
                    if !visited[next] {
                        visited[next] = true;
                        stack.push((next, successors[next].iter().copied().collect()));
                    }
                }
                None => {
                    order.push(node);
                    stack.pop();
                }
            }
        }
    }

    // Second pass: flood the reversed graph in reverse finish order.
    let mut assigned = vec![false; n];
    let mut count = 0;
    for &root in order.iter().rev() {
        if assigned[root] {
            continue;
        }
        count += 1;
        assigned[root] = true;
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            for &prev in &predecessors[node] {
                if !assigned[prev] {
                    assigned[prev] = true;
                    stack.push(prev);
                }
            }
        }
    }
    count
}

fn centrality_summary(
    undirected: &[BTreeSet<usize>],
    successors: &[BTreeSet<usize>],
    predecessors: &[BTreeSet<usize>],
) -> CentralitySummary {
    let n = undirected.len();
    if n < 2 {
        return CentralitySummary::default();
    }
    let scale = (n - 1) as f64;
    let degree: Vec<f64> = undirected.iter().map(|s| s.len() as f64 / scale).collect();
    let max_of = |sets: &[BTreeSet<usize>]| {
        sets.iter().map(|s| s.len() as f64 / scale).fold(0.0, f64::max)
    };

    CentralitySummary {
        max_degree_centrality: degree.iter().copied().fold(0.0, f64::max),
        mean_degree_centrality: degree.iter().sum::<f64>() / n as f64,
        max_in_degree_centrality: max_of(predecessors),
        max_out_degree_centrality: max_of(successors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;
    use crate::graph::{GraphStore, Transaction};
    use chrono::{TimeZone, Utc};

    fn graph(edges: &[(&str, &str, f64)]) -> WindowedGraph {
        let mut store = GraphStore::new(GraphConfig::default());
        for (i, (from, to, amount)) in edges.iter().enumerate() {
            let ts = Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap();
            store
                .insert(&Transaction::new(format!("t{i}"), *from, *to, *amount, ts))
                .unwrap();
        }
        store.snapshot()
    }

    #[test]
    fn test_empty_graph_is_zero() {
        assert_eq!(StructuralMetrics::compute(&WindowedGraph::empty()), StructuralMetrics::default());
    }

    #[test]
    fn test_directed_triangle() {
        let g = graph(&[("A", "B", 100.0), ("B", "C", 100.0), ("C", "A", 100.0)]);
        let m = StructuralMetrics::compute(&g);

        assert_eq!(m.node_count, 3);
        assert_eq!(m.edge_count, 3);
        assert!((m.density - 0.5).abs() < 1e-12);
        assert!((m.clustering_coefficient - 1.0).abs() < 1e-12);
        assert_eq!(m.num_connected_components, 1);
        assert_eq!(m.num_strongly_connected_components, 1);
        assert!((m.average_degree - 2.0).abs() < 1e-12);
        assert!((m.centrality.max_degree_centrality - 1.0).abs() < 1e-12);
        assert!((m.centrality.max_in_degree_centrality - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_two_disjoint_pairs() {
        let g = graph(&[("A", "B", 10.0), ("C", "D", 10.0)]);
        let m = StructuralMetrics::compute(&g);

        assert_eq!(m.num_connected_components, 2);
        assert_eq!(m.num_strongly_connected_components, 4);
        assert_eq!(m.clustering_coefficient, 0.0);
    }

    #[test]
    fn test_hub_fan_in() {
        let g = graph(&[("A", "H", 1.0), ("B", "H", 1.0), ("C", "H", 1.0), ("D", "H", 1.0)]);
        let m = StructuralMetrics::compute(&g);

        assert!((m.centrality.max_in_degree_centrality - 1.0).abs() < 1e-12);
        assert!((m.centrality.max_out_degree_centrality - 0.25).abs() < 1e-12);
        assert_eq!(m.num_connected_components, 1);
        assert_eq!(m.num_strongly_connected_components, 5);
    }

    #[test]
    fn test_vector_matches_names() {
        let g = graph(&[("A", "B", 1.0)]);
        assert_eq!(StructuralMetrics::compute(&g).as_vec().len(), StructuralMetrics::NAMES.len());
    }
}
