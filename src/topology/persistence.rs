//! Persistent Homology via Boundary Matrix Reduction
//!
//! Standard algorithm over GF(2):
//!
//! 1. Column j of the boundary matrix holds the filtration indices of
//!    the codimension-1 faces of simplex j
//! 2. Reduce columns left to right: while low(j) equals low(i) for an
//!    earlier column i, add column i to column j (symmetric difference)
//! 3. A column reducing to zero creates a class at its simplex's value;
//!    a column with low(j) = i kills the class created by simplex i
//! 4. Classes still alive after the last column are essential (death = ∞)
//!
//! Columns are sparse sorted index lists; each evaluation builds its own
//! matrix and drops it afterwards.
//!
//! ## Reference
//!
//! Edelsbrunner, Letscher, Zomorodian (2002). "Topological Persistence
//! and Simplification". Discrete & Computational Geometry.

use super::filtration::Filtration;
use crate::error::{EngineError, Result};
use std::collections::{BTreeMap, HashMap};

/// One topological feature's lifespan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersistencePair {
    pub dimension: usize,
    pub birth: f64,
    /// `f64::INFINITY` for essential classes.
    pub death: f64,
    /// Filtration index of the simplex that created the class.
    pub birth_simplex: usize,
    /// Filtration index of the simplex that killed it, if any.
    pub death_simplex: Option<usize>,
}

impl PersistencePair {
    pub fn persistence(&self) -> f64 {
        if self.death.is_infinite() {
            f64::INFINITY
        } else {
            self.death - self.birth
        }
    }

    pub fn is_essential(&self) -> bool {
        self.death.is_infinite()
    }

    /// Persistence with essential classes truncated at `cutoff`.
    pub fn capped_persistence(&self, cutoff: f64) -> f64 {
        (self.death.min(cutoff) - self.birth).max(0.0)
    }
}

/// Birth/death pairs grouped by homology dimension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistenceDiagram {
    pairs: BTreeMap<usize, Vec<PersistencePair>>,
    max_dimension: usize,
}

impl PersistenceDiagram {
    /// Empty diagram covering dimensions `0..=max_dimension`.
    pub fn new(max_dimension: usize) -> Self {
        Self {
            pairs: (0..=max_dimension).map(|d| (d, Vec::new())).collect(),
            max_dimension,
        }
    }

    pub fn max_dimension(&self) -> usize {
        self.max_dimension
    }

    /// Pairs of dimension `d`, sorted by (birth, death).
    pub fn dim(&self, d: usize) -> &[PersistencePair] {
        self.pairs.get(&d).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &PersistencePair> {
        self.pairs.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.pairs.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finite pairs in dimension `d`.
    pub fn finite(&self, d: usize) -> impl Iterator<Item = &PersistencePair> {
        self.dim(d).iter().filter(|p| !p.is_essential())
    }

    /// Essential pairs in dimension `d`.
    pub fn essential(&self, d: usize) -> impl Iterator<Item = &PersistencePair> {
        self.dim(d).iter().filter(|p| p.is_essential())
    }

    fn push(&mut self, pair: PersistencePair) {
        self.pairs.entry(pair.dimension).or_default().push(pair);
    }

    fn sort(&mut self) {
        for pairs in self.pairs.values_mut() {
            pairs.sort_by(|a, b| {
                a.birth
                    .total_cmp(&b.birth)
                    .then(a.death.total_cmp(&b.death))
                    .then(a.birth_simplex.cmp(&b.birth_simplex))
            });
        }
    }
}

/// Sparse GF(2) column: strictly increasing row indices.
#[derive(Debug, Clone, Default)]
struct SparseColumn {
    rows: Vec<usize>,
}

impl SparseColumn {
    fn from_sorted(rows: Vec<usize>) -> Self {
        Self { rows }
    }

    fn is_zero(&self) -> bool {
        self.rows.is_empty()
    }

    /// Lowest (maximum) non-zero row.
    fn low(&self) -> Option<usize> {
        self.rows.last().copied()
    }

    /// Addition in Z/2Z: symmetric difference of two sorted lists.
    fn add_assign(&mut self, other: &SparseColumn) {
        let mut merged = Vec::with_capacity(self.rows.len() + other.rows.len());
        let (mut i, mut j) = (0, 0);
        while i < self.rows.len() && j < other.rows.len() {
            let (a, b) = (self.rows[i], other.rows[j]);
            if a < b {
                merged.push(a);
                i += 1;
            } else if b < a {
                merged.push(b);
                j += 1;
            } else {
                i += 1;
                j += 1;
            }
        }
        merged.extend_from_slice(&self.rows[i..]);
        merged.extend_from_slice(&other.rows[j..]);
        self.rows = merged;
    }
}

/// Computes persistence diagrams from filtrations.
#[derive(Debug, Clone)]
pub struct PersistenceEngine {
    max_dimension: usize,
}

impl PersistenceEngine {
    /// Engine reporting homology in dimensions `0..=max_dimension`.
    pub fn new(max_dimension: usize) -> Self {
        Self { max_dimension }
    }

    /// Reduce the boundary matrix of `filtration`.
    ///
    /// Fails with `InternalConsistency` if a face is missing, appears
    /// after its coface, or a positive-dimensional simplex has no faces.
    pub fn compute(&self, filtration: &Filtration) -> Result<PersistenceDiagram> {
        let simplices = filtration.simplices();
        let index = filtration.index();
        let m = simplices.len();

        let mut columns: Vec<SparseColumn> = Vec::with_capacity(m);
        let mut low_to_col: HashMap<usize, usize> = HashMap::new();

        for (col_idx, simplex) in simplices.iter().enumerate() {
            let mut rows: Vec<usize> = Vec::with_capacity(simplex.vertices.len());
            for face in simplex.faces() {
                match index.get(face.as_slice()) {
                    Some(&row) if row < col_idx => rows.push(row),
                    Some(&row) => {
                        return Err(EngineError::InternalConsistency(format!(
                            "face {:?} (index {}) does not precede simplex {:?} (index {})",
                            face, row, simplex.vertices, col_idx
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
            if simplex.dimension() > 0 && rows.is_empty() {
                return Err(EngineError::InternalConsistency(format!(
                    "simplex {:?} has an empty boundary",
                    simplex.vertices
                )));
            }
            rows.sort_unstable();
            rows.dedup();
            let mut column = SparseColumn::from_sorted(rows);

            while let Some(low) = column.low() {
                match low_to_col.get(&low) {
                    Some(&pivot_col) => column.add_assign(&columns[pivot_col]),
                    None => break,
                }
            }

            if let Some(low) = column.low() {
                low_to_col.insert(low, col_idx);
            }
            columns.push(column);
        }

        let mut diagram = PersistenceDiagram::new(self.max_dimension);
        let mut killed = vec![false; m];

        for (col_idx, column) in columns.iter().enumerate() {
            let Some(low) = column.low() else { continue };
            killed[low] = true;
            let birth = &simplices[low];
            let death = &simplices[col_idx];
            if birth.value > death.value {
                return Err(EngineError::InternalConsistency(format!(
                    "class born at {} dies earlier at {}",
                    birth.value, death.value
                )));
            }
            if birth.dimension() <= self.max_dimension {
                diagram.push(PersistencePair {
                    dimension: birth.dimension(),
                    birth: birth.value,
                    death: death.value,
                    birth_simplex: low,
                    death_simplex: Some(col_idx),
                });
            }
        }

        for (idx, simplex) in simplices.iter().enumerate() {
            if columns[idx].is_zero() && !killed[idx] && simplex.dimension() <= self.max_dimension {
                diagram.push(PersistencePair {
                    dimension: simplex.dimension(),
                    birth: simplex.value,
                    death: f64::INFINITY,
                    birth_simplex: idx,
                    death_simplex: None,
                });
            }
        }

        diagram.sort();
        Ok(diagram)
    }
}
