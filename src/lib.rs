//! # TopoGuard
//!
//! Topological Feature Engine for Transaction Fraud Detection
//!
//! ## Framework
//!
//! Transactions inside a sliding time window form a directed, weighted
//! account graph. Ordinary traffic is a sparse web of one-off transfers;
//! laundering rings and mule hubs leave shapes in that web: closed cycles
//! of transfers, tightly knit clusters, fan-in/fan-out stars.
//!
//! ### Pipeline
//!
//! 1. **GraphStore**: windowed account graph with validated inserts and
//!    time-based expiry
//!
//! 2. **Filtration**: clique complex over pair distances d = 1/(1+w),
//!    so heavily transacting pairs connect early
//!
//! 3. **Persistent Homology**: exact boundary-matrix reduction over GF(2)
//!    yields birth/death pairs for H0 (clusters), H1 (cycles) and H2 (voids)
//!
//! 4. **Features**: per-dimension persistence statistics plus structural
//!    graph metrics
//!
//! 5. **Scoring**: z-distance from a cross-window baseline squashed into
//!    [0, 1], with a CUSUM monitor over the score stream
//!
//! ## Example
//!
//! ```no_run
//! use topoguard::{EngineConfig, TopologyEngine, Transaction};
//! use chrono::Utc;
//!
//! let engine = TopologyEngine::new(EngineConfig::default())?;
//! engine.insert(&Transaction::new("tx_1", "alice", "bob", 250.0, Utc::now()))?;
//! let report = engine.evaluate_window(Utc::now())?;
//! println!("{} {:.3}", report.window_id, report.score.combined_score);
//! # Ok::<(), topoguard::EngineError>(())
//! ```
//!
//! ## References
//!
//! - Edelsbrunner & Harer, "Computational Topology" (2010)
//! - Zomorodian & Carlsson, "Computing Persistent Homology" (2005)
//! - Page, "Continuous Inspection Schemes" (1954) - CUSUM

pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod graph;
pub mod scoring;
pub mod synthetic;
pub mod topology;

pub use config::{
    BaselineKind, DriftConfig, EngineConfig, FeatureConfig, FiltrationConfig, GraphConfig, ScoringConfig,
};
pub use engine::{evaluate_snapshot, EngineStats, Evaluation, TopologyEngine, WindowReport};
pub use error::{EngineError, Result, ValidationError};

// Graph
pub use graph::{GraphStore, StructuralMetrics, Transaction, WindowedGraph};

// Topology
pub use topology::{
    pair_distance, BettiNumbers, Filtration, FiltrationBuilder, PersistenceDiagram, PersistenceEngine,
    PersistencePair, Simplex,
};

// Features and scoring
pub use features::{DimensionFeatures, FeatureExtractor, FeatureVector};
pub use scoring::{AnomalyScore, AnomalyScorer, Baseline, DriftEvent, DriftMonitor};
