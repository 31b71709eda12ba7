//! Persistent Entropy: Information Content of a Diagram
//!
//! H_P = -Σᵢ pᵢ log(pᵢ), where pᵢ = lᵢ / L is the normalized lifetime
//! of feature i. Many features of similar lifetime give high entropy;
//! one dominant feature gives entropy near zero.

/// Entropy measures over a set of feature lifetimes
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TopologicalEntropy {
    /// Persistent entropy (Shannon, natural log)
    pub persistent_entropy: f64,
    /// Normalized entropy in [0, 1]
    pub normalized_entropy: f64,
    /// Total lifetime (normalization constant)
    pub total_lifetime: f64,
}

impl TopologicalEntropy {
    /// Compute entropy measures; non-positive lifetimes are ignored.
    pub fn from_lifetimes(lifetimes: &[f64]) -> Self {
        let (persistent_entropy, total_lifetime) = compute_persistent_entropy(lifetimes);
        let n = lifetimes.iter().filter(|&&l| l > 0.0).count();

        let normalized_entropy = if n > 1 {
            persistent_entropy / (n as f64).ln()
        } else {
            0.0
        };

        Self {
            persistent_entropy,
            normalized_entropy,
            total_lifetime,
        }
    }
}

/// Returns `(entropy, total_lifetime)`.
pub fn compute_persistent_entropy(lifetimes: &[f64]) -> (f64, f64) {
    let total: f64 = lifetimes.iter().filter(|&&l| l > 0.0).sum();
    if total <= 0.0 {
        return (0.0, 0.0);
    }

    let mut entropy = 0.0;
    for &l in lifetimes {
        let p = l / total;
        if p > 0.0 {
            entropy -= p * p.ln();
        }
    }

    (entropy, total)
}
