//! Clique Filtration of a Transaction Graph
//!
//! The filtration is a Vietoris-Rips style clique complex over the
//! windowed graph:
//! - 0-simplices are the accounts, entering at 0
//! - 1-simplices are connected pairs, entering at d(u, v) = 1 / (1 + w(u, v))
//! - a k-simplex [v₀, ..., vₖ] exists iff all its edges exist, and enters
//!   at the largest of its edge distances
//!
//! where w(u, v) is the total amount exchanged between u and v in either
//! direction. Heavily connected pairs are "close" and enter early.
//!
//! Unlike a point-cloud Rips complex, only observed pairs have a distance;
//! unconnected pairs are at infinity and never form an edge.

use crate::config::FiltrationConfig;
use crate::error::{EngineError, Result};
use crate::graph::WindowedGraph;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Distance between two accounts given the total amount between them.
///
/// Non-increasing in `total_weight`, in (0, 1] for non-negative weights.
pub fn pair_distance(total_weight: f64) -> f64 {
    1.0 / (1.0 + total_weight.max(0.0))
}

/// A simplex over snapshot account indices, with its filtration value.
#[derive(Debug, Clone, PartialEq)]
pub struct Simplex {
    /// Sorted account indices. Snapshot indices follow account-id order,
    /// so this is also the lexicographic order of identifiers.
    pub vertices: Vec<usize>,
    /// Scale at which the simplex enters the complex.
    pub value: f64,
}

impl Simplex {
    pub fn dimension(&self) -> usize {
        self.vertices.len().saturating_sub(1)
    }

    /// Codimension-1 faces, each obtained by dropping one vertex.
    pub fn faces(&self) -> impl Iterator<Item = Vec<usize>> + '_ {
        let k = if self.vertices.len() > 1 { self.vertices.len() } else { 0 };
        (0..k).map(move |skip| {
            self.vertices
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != skip)
                .map(|(_, &v)| v)
                .collect()
        })
    }

    /// Filtration order: value, then dimension, then vertex tuple.
    pub fn filtration_cmp(&self, other: &Simplex) -> Ordering {
        self.value
            .total_cmp(&other.value)
            .then(self.dimension().cmp(&other.dimension()))
            .then_with(|| self.vertices.cmp(&other.vertices))
    }
}

/// Totally ordered sequence of simplices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filtration {
    simplices: Vec<Simplex>,
    /// Account identifiers, indexed like the snapshot the filtration came from.
    labels: Vec<String>,
    scale_cutoff: f64,
}

impl Filtration {
    /// Assemble a filtration from arbitrary simplices, sorting them into
    /// filtration order. Closure is not checked here; see
    /// [`Filtration::verify_closure`].
    pub fn from_simplices(mut simplices: Vec<Simplex>, labels: Vec<String>, scale_cutoff: f64) -> Self {
        simplices.sort_by(Simplex::filtration_cmp);
        Self {
            simplices,
            labels,
            scale_cutoff,
        }
    }

    pub fn len(&self) -> usize {
        self.simplices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.simplices.is_empty()
    }

    pub fn simplices(&self) -> &[Simplex] {
        &self.simplices
    }

    pub fn get(&self, index: usize) -> Option<&Simplex> {
        self.simplices.get(index)
    }

    pub fn scale_cutoff(&self) -> f64 {
        self.scale_cutoff
    }

    /// Number of simplices of dimension `d`.
    pub fn count_dimension(&self, d: usize) -> usize {
        self.simplices.iter().filter(|s| s.dimension() == d).count()
    }

    /// Account identifiers of a simplex's vertices.
    pub fn labels_of(&self, simplex: &Simplex) -> Vec<&str> {
        simplex
            .vertices
            .iter()
            .map(|&v| self.labels.get(v).map(String::as_str).unwrap_or("?"))
            .collect()
    }

    /// Map from vertex tuple to filtration index.
    pub fn index(&self) -> HashMap<&[usize], usize> {
        self.simplices
            .iter()
            .enumerate()
            .map(|(idx, s)| (s.vertices.as_slice(), idx))
            .collect()
    }

    /// Check that every face of every simplex appears strictly earlier.
    pub fn verify_closure(&self) -> Result<()> {
        let index = self.index();
        for (pos, simplex) in self.simplices.iter().enumerate() {
            for face in simplex.faces() {
                match index.get(face.as_slice()) {
                    Some(&face_pos) if face_pos < pos => {}
                    Some(&face_pos) => {
                        return Err(EngineError::InternalConsistency(format!(
                            "face {:?} at position {} does not precede simplex {:?} at {}",
                            face, face_pos, simplex.vertices, pos
                        )));
                    }
                    None => {
                        return Err(EngineError::InternalConsistency(format!(
                            "face {:?} of simplex {:?} missing from filtration",
                            face, simplex.vertices
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Builds clique filtrations from windowed graphs.
#[derive(Debug, Clone)]
pub struct FiltrationBuilder {
    /// Highest simplex dimension emitted.
    max_dimension: usize,
    /// Maximum filtration value admitted.
    scale_cutoff: f64,
}

impl FiltrationBuilder {
    pub fn new(max_dimension: usize, scale_cutoff: f64) -> Self {
        Self {
            max_dimension,
            scale_cutoff,
        }
    }

    pub fn from_config(config: &FiltrationConfig) -> Self {
        Self::new(config.max_homology_dimension, config.scale_cutoff)
    }

    /// Edge distances for every connected pair within the cutoff.
    pub fn edge_distances(&self, graph: &WindowedGraph) -> BTreeMap<(usize, usize), f64> {
        graph
            .pair_weights()
            .into_iter()
            .map(|(pair, weight)| (pair, pair_distance(weight)))
            .filter(|&(_, d)| d <= self.scale_cutoff)
            .collect()
    }

    /// Build the filtration. An empty graph yields an empty filtration.
    pub fn build(&self, graph: &WindowedGraph) -> Filtration {
        let labels: Vec<String> = graph.accounts().iter().map(|a| a.id.clone()).collect();
        if graph.is_empty() {
            return Filtration::from_simplices(Vec::new(), labels, self.scale_cutoff);
        }

        let n = graph.node_count();
        let distances = self.edge_distances(graph);

        // 0-simplices
        let mut simplices: Vec<Simplex> = (0..n)
            .map(|v| Simplex {
                vertices: vec![v],
                value: 0.0,
            })
            .collect();

        if self.max_dimension >= 1 {
            // Higher-indexed neighbours only, so each clique is built once
            // with its vertices already sorted.
            let mut upper: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
            for &(u, v) in distances.keys() {
                upper[u].insert(v);
            }

            let mut frontier: Vec<Simplex> = distances
                .iter()
                .map(|(&(u, v), &d)| Simplex {
                    vertices: vec![u, v],
                    value: d,
                })
                .collect();

            for _ in 2..=self.max_dimension {
                let next = Self::expand(&frontier, &upper, &distances);
                simplices.append(&mut frontier);
                frontier = next;
                if frontier.is_empty() {
                    break;
                }
            }
            simplices.append(&mut frontier);
        }

        Filtration::from_simplices(simplices, labels, self.scale_cutoff)
    }

    /// Extend each k-clique by every common higher neighbour.
    fn expand(
        cliques: &[Simplex],
        upper: &[BTreeSet<usize>],
        distances: &BTreeMap<(usize, usize), f64>,
    ) -> Vec<Simplex> {
        let mut out = Vec::new();
        for clique in cliques {
            let Some(&last) = clique.vertices.last() else {
                continue;
            };
            'candidate: for &w in upper[last].iter() {
                let mut value = clique.value;
                for &u in &clique.vertices {
                    match distances.get(&(u, w)) {
                        Some(&d) => value = value.max(d),
                        None => continue 'candidate,
                    }
                }
                let mut vertices = clique.vertices.clone();
                vertices.push(w);
                out.push(Simplex { vertices, value });
            }
        }
        out
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
    fn test_distance_is_monotone() {
        let weights = [0.0, 0.5, 1.0, 10.0, 100.0, 1e6];
        for pair in weights.windows(2) {
            assert!(pair_distance(pair[0]) >= pair_distance(pair[1]));
        }
        assert_eq!(pair_distance(0.0), 1.0);
        assert!((pair_distance(100.0) - 1.0 / 101.0).abs() < 1e-15);
    }

    #[test]
    fn test_empty_graph() {
        let f = FiltrationBuilder::new(2, 1.0).build(&WindowedGraph::empty());
        assert!(f.is_empty());
        assert!(f.verify_closure().is_ok());
    }

    #[test]
    fn test_triangle() {
        let g = graph(&[("A", "B", 100.0), ("B", "C", 100.0), ("C", "A", 100.0)]);
        let f = FiltrationBuilder::new(2, 1.0).build(&g);

        assert_eq!(f.len(), 7);
        assert_eq!(f.count_dimension(0), 3);
        assert_eq!(f.count_dimension(1), 3);
        assert_eq!(f.count_dimension(2), 1);

        let last = f.simplices().last().unwrap();
        assert_eq!(last.vertices, vec![0, 1, 2]);
        assert!((last.value - 1.0 / 101.0).abs() < 1e-15);
        assert_eq!(f.labels_of(last), vec!["A", "B", "C"]);
        assert!(f.verify_closure().is_ok());
    }

    #[test]
    fn test_parallel_and_reverse_edges_accumulate() {
        let g = graph(&[("A", "B", 30.0), ("B", "A", 20.0), ("A", "B", 50.0)]);
        let f = FiltrationBuilder::new(1, 1.0).build(&g);
        let edge = &f.simplices()[2];
        assert_eq!(edge.vertices, vec![0, 1]);
        assert!((edge.value - 1.0 / 101.0).abs() < 1e-15);
    }

    #[test]
    fn test_scale_cutoff_discards_weak_edges() {
        // A-B strong, B-C weak (d = 0.5), A-C strong.
        let g = graph(&[("A", "B", 100.0), ("B", "C", 1.0), ("A", "C", 100.0)]);
        let f = FiltrationBuilder::new(2, 0.1).build(&g);

        assert_eq!(f.count_dimension(1), 2);
        assert_eq!(f.count_dimension(2), 0, "triangle needs the discarded edge");
        assert!(f.simplices().iter().all(|s| s.value <= 0.1));
    }

    #[test]
    fn test_max_dimension_limits_expansion() {
        // Complete graph on four accounts.
        let g = graph(&[
            ("A", "B", 1.0),
            ("A", "C", 2.0),
            ("A", "D", 3.0),
            ("B", "C", 4.0),
            ("B", "D", 5.0),
            ("C", "D", 6.0),
        ]);
        assert_eq!(FiltrationBuilder::new(1, 1.0).build(&g).count_dimension(2), 0);
        let f = FiltrationBuilder::new(2, 1.0).build(&g);
        assert_eq!(f.count_dimension(2), 4);
        assert_eq!(f.count_dimension(3), 0);
        assert!(f.verify_closure().is_ok());
    }

    #[test]
    fn test_ordering_is_deterministic_and_sorted() {
        let edges = [
            ("A", "B", 5.0),
            ("B", "C", 5.0),
            ("C", "A", 5.0),
            ("C", "D", 7.0),
            ("D", "A", 1.0),
        ];
        let a = FiltrationBuilder::new(2, 1.0).build(&graph(&edges));
        let b = FiltrationBuilder::new(2, 1.0).build(&graph(&edges));
        assert_eq!(a, b);
        for pair in a.simplices().windows(2) {
            assert_eq!(pair[0].filtration_cmp(&pair[1]), Ordering::Less);
        }
    }

    #[test]
    fn test_closure_violation_detected() {
        let f = Filtration::from_simplices(
            vec![
                Simplex { vertices: vec![0], value: 0.0 },
                Simplex { vertices: vec![0, 1], value: 0.5 },
            ],
            vec!["A".into(), "B".into()],
            1.0,
        );
        assert!(matches!(f.verify_closure(), Err(EngineError::InternalConsistency(_))));
    }
}
