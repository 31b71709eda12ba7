//! The topological feature engine.
//!
//! Two entry points mutate state: [`TopologyEngine::insert`] and
//! [`TopologyEngine::advance`]. Both take the write side of one
//! `RwLock<GraphStore>`; snapshots take the read side and copy out, so
//! evaluation never holds the graph lock.
//!
//! ```text
//! GraphStore ──snapshot──▶ Filtration ──▶ PersistenceDiagram
//!                                              │
//!                  AnomalyScore ◀── scorer ◀── FeatureVector
//! ```

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::features::{FeatureExtractor, FeatureVector};
use crate::graph::{AdvanceReport, GraphStore, InsertOutcome, Transaction, WindowedGraph};
use crate::scoring::{AnomalyScore, AnomalyScorer, DriftEvent};
use crate::topology::{BettiNumbers, FiltrationBuilder, PersistenceDiagram, PersistenceEngine};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

/// Output of one pure evaluation over a snapshot.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub graph_version: u64,
    pub simplex_count: usize,
    pub pair_count: usize,
    pub diagram: PersistenceDiagram,
    /// Betti numbers at the scale cutoff.
    pub betti: BettiNumbers,
    pub features: FeatureVector,
}

/// Filtration → persistence → features over an immutable snapshot.
///
/// Touches no shared state; independent snapshots may be evaluated in
/// parallel.
pub fn evaluate_snapshot(graph: &WindowedGraph, config: &EngineConfig) -> Result<Evaluation> {
    let cutoff = config.filtration.scale_cutoff;
    let filtration = FiltrationBuilder::from_config(&config.filtration).build(graph);
    filtration.verify_closure()?;

    let diagram = PersistenceEngine::new(config.filtration.max_homology_dimension).compute(&filtration)?;
    let features = FeatureExtractor::new(config.features.clone(), cutoff).extract(&diagram, graph);
    let betti = BettiNumbers::at_scale(&diagram, cutoff);

    debug!(
        accounts = graph.node_count(),
        edges = graph.edge_count(),
        simplices = filtration.len(),
        pairs = diagram.len(),
        beta_0 = betti.beta_0,
        beta_1 = betti.beta_1,
        "evaluated snapshot"
    );

    Ok(Evaluation {
        graph_version: graph.version(),
        simplex_count: filtration.len(),
        pair_count: diagram.len(),
        diagram,
        betti,
        features,
    })
}

/// Result of one window tick.
#[derive(Debug, Clone, Serialize)]
pub struct WindowReport {
    pub window_id: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub expired_edges: usize,
    pub dropped_accounts: usize,
    pub simplex_count: usize,
    pub score: AnomalyScore,
    /// Whether this window was folded into the baseline.
    pub baseline_updated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drift: Option<DriftEvent>,
}

/// Counters since construction, plus current window size.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub accepted_transactions: u64,
    pub rejected_transactions: u64,
    pub evaluations: u64,
    pub failed_evaluations: u64,
    pub flagged_windows: u64,
    pub flagged_transactions: u64,
    pub drift_events: u64,
    pub active_accounts: usize,
    pub active_edges: usize,
    pub baseline_windows: usize,
}

#[derive(Debug, Default)]
struct Counters {
    accepted: AtomicU64,
    rejected: AtomicU64,
    evaluations: AtomicU64,
    failed: AtomicU64,
    flagged_windows: AtomicU64,
    flagged_transactions: AtomicU64,
    drift_events: AtomicU64,
    windows: AtomicU64,
}

/// Shared engine: graph store, scorer and counters.
#[derive(Debug)]
pub struct TopologyEngine {
    config: EngineConfig,
    store: RwLock<GraphStore>,
    scorer: Mutex<AnomalyScorer>,
    counters: Counters,
}

impl TopologyEngine {
    /// Validate `config` and build an empty engine.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store: RwLock::new(GraphStore::new(config.graph.clone())),
            scorer: Mutex::new(AnomalyScorer::new(config.scoring.clone())),
            counters: Counters::default(),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Add a transaction to the window.
    pub fn insert(&self, tx: &Transaction) -> Result<InsertOutcome> {
        let outcome = self.store.write().insert(tx);
        match outcome {
            Ok(outcome) => {
                self.counters.accepted.fetch_add(1, Ordering::Relaxed);
                if outcome.evicted_edges > 0 {
                    warn!(
                        evicted = outcome.evicted_edges,
                        max_edges = self.config.graph.max_edges,
                        "graph at capacity, evicted oldest edges"
                    );
                }
                Ok(outcome)
            }
            Err(e) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(transaction_id = %tx.transaction_id, error = %e, "rejected transaction");
                Err(e.into())
            }
        }
    }

    /// Slide the window to end at `now`.
    pub fn advance(&self, now: DateTime<Utc>) -> Result<AdvanceReport> {
        let report = self.store.write().advance(now).map_err(|e| {
            warn!(error = %e, "rejected window advance");
            EngineError::from(e)
        })?;
        debug!(
            expired = report.expired_edges,
            dropped = report.dropped_accounts,
            end = %report.window_end,
            "advanced window"
        );
        Ok(report)
    }

    pub fn snapshot(&self) -> WindowedGraph {
        self.store.read().snapshot()
    }

    /// Evaluate a snapshot with this engine's configuration, counting the outcome.
    pub fn evaluate(&self, graph: &WindowedGraph) -> Result<Evaluation> {
        self.counters.evaluations.fetch_add(1, Ordering::Relaxed);
        evaluate_snapshot(graph, &self.config).map_err(|e| {
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
            error!(version = graph.version(), error = %e, "evaluation aborted");
            e
        })
    }

    /// Advance to `now`, evaluate the window, score it and fold it into
    /// the baseline unless flagged or empty.
    pub fn evaluate_window(&self, now: DateTime<Utc>) -> Result<WindowReport> {
        let advance = self.advance(now)?;
        let graph = self.snapshot();
        let evaluation = self.evaluate(&graph)?;

        let seq = self.counters.windows.fetch_add(1, Ordering::Relaxed);
        let window_id = format!("window-{seq}");

        let (score, baseline_updated, drift) = {
            let mut scorer = self.scorer.lock();
            let score = scorer.score(window_id.clone(), &evaluation.features);
            let (updated, drift) = scorer.observe_window(&score);
            (score, updated, drift)
        };

        if score.is_fraudulent {
            self.counters.flagged_windows.fetch_add(1, Ordering::Relaxed);
            warn!(
                window = %window_id,
                combined = score.combined_score,
                reason = %score.reason,
                "Fraud detected"
            );
        }
        if let Some(event) = &drift {
            self.counters.drift_events.fetch_add(1, Ordering::Relaxed);
            info!(
                window = %window_id,
                cusum = event.cusum_value,
                change_point = event.estimated_change_point,
                "score drift detected"
            );
        }

        Ok(WindowReport {
            window_id,
            window_start: advance.window_start,
            window_end: advance.window_end,
            expired_edges: advance.expired_edges,
            dropped_accounts: advance.dropped_accounts,
            simplex_count: evaluation.simplex_count,
            score,
            baseline_updated,
            drift,
        })
    }

    /// Insert `tx`, then score the window as of that insert.
    ///
    /// The baseline is read but never updated.
    pub fn score_transaction(&self, tx: &Transaction) -> Result<AnomalyScore> {
        self.insert(tx)?;
        let graph = self.snapshot();
        let evaluation = self.evaluate(&graph)?;
        let score = self.scorer.lock().score(tx.transaction_id.clone(), &evaluation.features);

        if score.is_fraudulent {
            self.counters.flagged_transactions.fetch_add(1, Ordering::Relaxed);
            warn!(
                transaction_id = %tx.transaction_id,
                combined = score.combined_score,
                reason = %score.reason,
                "Fraud detected"
            );
        }
        Ok(score)
    }

    /// Score each transaction in order; one failure does not stop the rest.
    pub fn score_batch(&self, txs: &[Transaction]) -> Vec<Result<AnomalyScore>> {
        txs.iter().map(|tx| self.score_transaction(tx)).collect()
    }

    pub fn stats(&self) -> EngineStats {
        let (active_accounts, active_edges) = {
            let store = self.store.read();
            (store.active_account_count(), store.edge_count())
        };
        let c = &self.counters;
        EngineStats {
            accepted_transactions: c.accepted.load(Ordering::Relaxed),
            rejected_transactions: c.rejected.load(Ordering::Relaxed),
            evaluations: c.evaluations.load(Ordering::Relaxed),
            failed_evaluations: c.failed.load(Ordering::Relaxed),
            flagged_windows: c.flagged_windows.load(Ordering::Relaxed),
            flagged_transactions: c.flagged_transactions.load(Ordering::Relaxed),
            drift_events: c.drift_events.load(Ordering::Relaxed),
            active_accounts,
            active_edges,
            baseline_windows: self.scorer.lock().baseline_len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn tx(id: &str, from: &str, to: &str, secs: i64) -> Transaction {
        Transaction::new(id, from, to, 100.0, t0() + TimeDelta::seconds(secs))
    }

    #[test]
    fn test_rejections_are_counted() {
        let engine = TopologyEngine::new(EngineConfig::default()).unwrap();
        engine.insert(&tx("t1", "A", "B", 0)).unwrap();

        let err = engine.insert(&tx("t1", "A", "C", 1)).unwrap_err();
        assert!(err.is_validation());
        assert!(engine.insert(&tx("t2", "A", "A", 2)).is_err());

        let stats = engine.stats();
        assert_eq!(stats.accepted_transactions, 1);
        assert_eq!(stats.rejected_transactions, 2);
        assert_eq!(stats.active_edges, 1);
    }

    #[test]
    fn test_empty_window_report() {
        let engine = TopologyEngine::new(EngineConfig::default()).unwrap();
        let report = engine.evaluate_window(t0()).unwrap();
        assert_eq!(report.score.combined_score, 0.0);
        assert!(!report.score.is_fraudulent);
        assert!(!report.baseline_updated);
        assert_eq!(report.simplex_count, 0);
    }

    #[test]
    fn test_evaluate_snapshot_triangle() {
        let engine = TopologyEngine::new(EngineConfig::default()).unwrap();
        for (i, (a, b)) in [("A", "B"), ("B", "C"), ("C", "A")].iter().enumerate() {
            engine.insert(&tx(&format!("t{i}"), a, b, i as i64)).unwrap();
        }
        let eval = evaluate_snapshot(&engine.snapshot(), engine.config()).unwrap();

        // 3 vertices, 3 edges, 1 triangle
        assert_eq!(eval.simplex_count, 7);
        assert_eq!(eval.betti.beta_0, 1);
        assert_eq!(eval.betti.beta_1, 0);
        assert_eq!(eval.features.structure.node_count, 3);
    }

    #[test]
    fn test_score_transaction_leaves_baseline_alone() {
        let engine = TopologyEngine::new(EngineConfig::default()).unwrap();
        let score = engine.score_transaction(&tx("t1", "A", "B", 0)).unwrap();
        assert_eq!(score.subject_id, "t1");
        assert!(!score.is_fraudulent);
        assert_eq!(engine.stats().baseline_windows, 0);
    }

    #[test]
    fn test_clock_regression_rejected() {
        let engine = TopologyEngine::new(EngineConfig::default()).unwrap();
        engine.advance(t0() + TimeDelta::hours(2)).unwrap();
        let err = engine.advance(t0()).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EngineConfig::default();
        config.graph.window_seconds = 0;
        assert!(matches!(TopologyEngine::new(config), Err(EngineError::Config(_))));
    }
}
