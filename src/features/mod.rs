//! Feature Extraction: Diagrams to Vectors
//!
//! Each window is summarised by a fixed-size [`FeatureVector`]:
//! five persistence statistics for each of H0, H1 and H2, plus the
//! structural metrics of the underlying graph.
//!
//! Essential classes (death = ∞) contribute `scale_cutoff - birth`,
//! so every entry is finite.

mod entropy;
mod extractor;

pub use entropy::{compute_persistent_entropy, TopologicalEntropy};
pub use extractor::{DimensionFeatures, FeatureExtractor, FeatureVector, FEATURE_DIMENSIONS};
