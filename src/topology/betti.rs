//! Betti Numbers: Topological Invariants
//!
//! The k-th Betti number βₖ counts the k-dimensional "holes" alive at a
//! given scale:
//!
//! - β₀: Connected clusters of accounts
//! - β₁: Cycles of transfers not filled in by denser connectivity
//! - β₂: Enclosed voids
//!
//! Read directly off the persistence diagram: a pair contributes to βₖ
//! at scale ε iff birth ≤ ε < death.

use super::persistence::PersistenceDiagram;

/// Betti numbers at a specific filtration value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BettiNumbers {
    pub beta_0: usize,
    pub beta_1: usize,
    pub beta_2: usize,
    pub epsilon: f64,
}

impl BettiNumbers {
    pub fn new(beta_0: usize, beta_1: usize, beta_2: usize, epsilon: f64) -> Self {
        Self { beta_0, beta_1, beta_2, epsilon }
    }

    /// Count classes alive at `epsilon`.
    pub fn at_scale(diagram: &PersistenceDiagram, epsilon: f64) -> Self {
        let alive = |d: usize| {
            diagram
                .dim(d)
                .iter()
                .filter(|p| p.birth <= epsilon && epsilon < p.death)
                .count()
        };
        Self::new(alive(0), alive(1), alive(2), epsilon)
    }

    /// Total topological complexity
    pub fn total(&self) -> usize {
        self.beta_0 + self.beta_1 + self.beta_2
    }

    /// Euler characteristic χ = β₀ - β₁ + β₂
    pub fn euler_characteristic(&self) -> i64 {
        self.beta_0 as i64 - self.beta_1 as i64 + self.beta_2 as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;
    use crate::graph::{GraphStore, Transaction};
    use crate::topology::{FiltrationBuilder, PersistenceEngine};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_square_betti() {
        let mut store = GraphStore::new(GraphConfig::default());
        let edges = [("A", "B"), ("B", "C"), ("C", "D"), ("D", "A")];
        for (i, (from, to)) in edges.iter().enumerate() {
            let ts = Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap();
            store
                .insert(&Transaction::new(format!("t{i}"), *from, *to, 9.0, ts))
                .unwrap();
        }
        let f = FiltrationBuilder::new(2, 1.0).build(&store.snapshot());
        let pd = PersistenceEngine::new(2).compute(&f).unwrap();

        let before = BettiNumbers::at_scale(&pd, 0.05);
        assert_eq!((before.beta_0, before.beta_1), (4, 0));

        let after = BettiNumbers::at_scale(&pd, 0.5);
        assert_eq!((after.beta_0, after.beta_1, after.beta_2), (1, 1, 0));
        assert_eq!(after.euler_characteristic(), 0);
        assert_eq!(after.total(), 2);
    }
}
