//! Topology Module: Filtrations and Persistent Homology
//!
//! Turns a windowed transaction graph into a persistence diagram:
//! - Clique filtration over transfer-weighted pair distances
//! - Exact persistent homology via boundary matrix reduction over GF(2)
//! - Betti numbers read off the diagram at a chosen scale
//!
//! ## Mathematical Background
//!
//! For the windowed graph G we build a filtration of simplicial complexes
//! K_ε indexed by the scale ε. Persistent homology tracks the birth and
//! death of connected clusters (H0), transfer cycles (H1) and enclosed
//! voids (H2) across this filtration. A cycle that survives over a long
//! range of scales is a ring of accounts moving money between each other
//! without the dense cross-links of ordinary traffic.

mod betti;
mod filtration;
mod persistence;

pub use betti::BettiNumbers;
pub use filtration::{pair_distance, Filtration, FiltrationBuilder, Simplex};
pub use persistence::{PersistenceDiagram, PersistenceEngine, PersistencePair};
