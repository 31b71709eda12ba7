//! Persistence diagram + graph statistics → fixed-size feature vector.

use super::entropy::TopologicalEntropy;
use crate::config::FeatureConfig;
use crate::graph::{StructuralMetrics, WindowedGraph};
use crate::topology::PersistenceDiagram;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Homology dimensions always present in a feature vector (H0, H1, H2).
pub const FEATURE_DIMENSIONS: usize = 3;

/// Per-dimension summary of a persistence diagram.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionFeatures {
    pub dimension: usize,
    /// Σ persistence, essential classes capped at the scale cutoff.
    pub total_persistence: f64,
    /// Pairs whose persistence exceeds the noise threshold.
    pub num_features: usize,
    /// Largest surviving persistence, 0 if none.
    pub max_persistence: f64,
    pub complexity_score: f64,
    /// Shannon entropy of surviving lifetimes.
    pub persistence_entropy: f64,
}

impl DimensionFeatures {
    pub const NAMES: [&'static str; 5] = [
        "total_persistence",
        "num_features",
        "max_persistence",
        "complexity_score",
        "persistence_entropy",
    ];

    fn zero(dimension: usize) -> Self {
        Self {
            dimension,
            ..Self::default()
        }
    }

    fn values(&self) -> [f64; 5] {
        [
            self.total_persistence,
            self.num_features as f64,
            self.max_persistence,
            self.complexity_score,
            self.persistence_entropy,
        ]
    }
}

/// Topological and structural features of one windowed graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub dimensions: [DimensionFeatures; FEATURE_DIMENSIONS],
    pub structure: StructuralMetrics,
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self::zero()
    }
}

impl FeatureVector {
    /// The all-zero vector produced for an empty window.
    pub fn zero() -> Self {
        Self {
            dimensions: [
                DimensionFeatures::zero(0),
                DimensionFeatures::zero(1),
                DimensionFeatures::zero(2),
            ],
            structure: StructuralMetrics::default(),
        }
    }

    pub fn dimension(&self, d: usize) -> Option<&DimensionFeatures> {
        self.dimensions.get(d)
    }

    /// Topological features flattened dimension-major.
    pub fn topology_array(&self) -> Array1<f64> {
        self.dimensions.iter().flat_map(|d| d.values()).collect()
    }

    pub fn structure_array(&self) -> Array1<f64> {
        Array1::from(self.structure.as_vec())
    }

    /// `(dimension, metric name)` of a position in [`FeatureVector::topology_array`].
    pub fn topology_feature(index: usize) -> (usize, &'static str) {
        let width = DimensionFeatures::NAMES.len();
        (index / width, DimensionFeatures::NAMES[index % width])
    }
}

/// Reduces diagrams and graphs to [`FeatureVector`]s.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: FeatureConfig,
    scale_cutoff: f64,
}

impl FeatureExtractor {
    /// `scale_cutoff` must be the value the filtration was built with.
    pub fn new(config: FeatureConfig, scale_cutoff: f64) -> Self {
        Self { config, scale_cutoff }
    }

    pub fn extract(&self, diagram: &PersistenceDiagram, graph: &WindowedGraph) -> FeatureVector {
        if graph.is_empty() {
            return FeatureVector::zero();
        }
        FeatureVector {
            dimensions: [
                self.dimension_features(diagram, 0),
                self.dimension_features(diagram, 1),
                self.dimension_features(diagram, 2),
            ],
            structure: StructuralMetrics::compute(graph),
        }
    }

    /// Summary of one homology dimension.
    pub fn dimension_features(&self, diagram: &PersistenceDiagram, d: usize) -> DimensionFeatures {
        let lifetimes: Vec<f64> = diagram
            .dim(d)
            .iter()
            .map(|p| p.capped_persistence(self.scale_cutoff))
            .collect();
        let surviving: Vec<f64> = lifetimes
            .iter()
            .copied()
            .filter(|&l| l > self.config.noise_threshold)
            .collect();

        let n = surviving.len();
        let surviving_sum: f64 = surviving.iter().sum();
        let mean = if n > 0 { surviving_sum / n as f64 } else { 0.0 };

        DimensionFeatures {
            dimension: d,
            total_persistence: lifetimes.iter().sum(),
            num_features: n,
            max_persistence: surviving.iter().copied().fold(0.0, f64::max),
            complexity_score: self.config.count_weight * n as f64
                + self.config.magnitude_weight * n as f64 * mean,
            persistence_entropy: TopologicalEntropy::from_lifetimes(&surviving).persistent_entropy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;
    use crate::graph::{GraphStore, Transaction};
    use crate::topology::{pair_distance, FiltrationBuilder, PersistenceEngine};
    use chrono::{TimeZone, Utc};

    fn features(edges: &[(&str, &str, f64)], max_dim: usize, config: FeatureConfig) -> FeatureVector {
        let mut store = GraphStore::new(GraphConfig::default());
        for (i, (from, to, amount)) in edges.iter().enumerate() {
            let ts = Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap();
            store
                .insert(&Transaction::new(format!("t{i}"), *from, *to, *amount, ts))
                .unwrap();
        }
        let g = store.snapshot();
        let f = FiltrationBuilder::new(max_dim, 1.0).build(&g);
        let pd = PersistenceEngine::new(max_dim).compute(&f).unwrap();
        FeatureExtractor::new(config, 1.0).extract(&pd, &g)
    }

    const TRIANGLE: [(&str, &str, f64); 3] = [("A", "B", 100.0), ("B", "C", 100.0), ("C", "A", 100.0)];

    #[test]
    fn test_empty_graph_gives_zero_vector() {
        let extractor = FeatureExtractor::new(FeatureConfig::default(), 1.0);
        let fv = extractor.extract(&PersistenceDiagram::new(2), &WindowedGraph::empty());
        assert_eq!(fv, FeatureVector::zero());
        assert!(fv.topology_array().iter().all(|&x| x == 0.0));
        assert!(fv.structure_array().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_filled_triangle_has_no_h1_feature() {
        let fv = features(&TRIANGLE, 2, FeatureConfig::default());
        assert_eq!(fv.dimensions[1].num_features, 0);
        assert_eq!(fv.dimensions[1].max_persistence, 0.0);
    }

    #[test]
    fn test_unfilled_triangle_counts_cycle() {
        let fv = features(&TRIANGLE, 1, FeatureConfig::default());
        let h1 = fv.dimensions[1];
        let expected = 1.0 - pair_distance(100.0);

        assert!(h1.num_features >= 1);
        assert!((h1.max_persistence - expected).abs() < 1e-12);
        assert!((h1.total_persistence - expected).abs() < 1e-12);
        assert!((h1.complexity_score - (0.1 + expected)).abs() < 1e-12);
        assert_eq!(fv.dimensions[2], DimensionFeatures::zero(2));
    }

    #[test]
    fn test_h0_totals_cap_essential_class() {
        let fv = features(&[("A", "B", 1.0)], 2, FeatureConfig::default());
        let h0 = fv.dimensions[0];
        // finite pair (0, 0.5) plus essential class capped at 1.0
        assert!((h0.total_persistence - 1.5).abs() < 1e-12);
        assert_eq!(h0.num_features, 2);
        assert!((h0.max_persistence - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_noise_threshold_suppresses_short_pairs() {
        let config = FeatureConfig {
            noise_threshold: 0.6,
            ..FeatureConfig::default()
        };
        let fv = features(&[("A", "B", 1.0)], 2, config);
        assert_eq!(fv.dimensions[0].num_features, 1);
        assert!((fv.dimensions[0].total_persistence - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_complexity_monotone_in_count_and_magnitude() {
        let extractor_cfg = FeatureConfig::default();
        let one_ring = features(&[("A", "B", 5.0), ("B", "C", 5.0), ("C", "D", 5.0), ("D", "A", 5.0)], 2, extractor_cfg.clone());
        let two_rings = features(
            &[
                ("A", "B", 5.0),
                ("B", "C", 5.0),
                ("C", "D", 5.0),
                ("D", "A", 5.0),
                ("E", "F", 5.0),
                ("F", "G", 5.0),
                ("G", "H", 5.0),
                ("H", "E", 5.0),
            ],
            2,
            extractor_cfg,
        );
        assert!(two_rings.dimensions[1].complexity_score > one_ring.dimensions[1].complexity_score);
    }

    #[test]
    fn test_topology_feature_names() {
        assert_eq!(FeatureVector::topology_feature(0), (0, "total_persistence"));
        assert_eq!(FeatureVector::topology_feature(6), (1, "num_features"));
        assert_eq!(FeatureVector::zero().topology_array().len(), FEATURE_DIMENSIONS * 5);
    }
}
