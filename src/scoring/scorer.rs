//! Feature vector → bounded anomaly score.
//!
//! Per feature: z = |x - μ| / max(σ, σ_floor). Each group (topology,
//! structure) is reduced to its root-mean-square z and squashed:
//!
//! score = tanh(rms_z / z_scale) ∈ [0, 1)
//!
//! The two group scores are blended by the configured weights.

use super::baseline::{self, Baseline, BaselineStats};
use super::drift::{DriftEvent, DriftMonitor};
use crate::config::ScoringConfig;
use crate::features::{FeatureVector, FEATURE_DIMENSIONS};
use crate::graph::StructuralMetrics;
use ndarray::{Array1, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Width of [`FeatureVector::topology_array`].
pub const TOPOLOGY_LEN: usize = FEATURE_DIMENSIONS * 5;
/// Width of [`FeatureVector::structure_array`].
pub const STRUCTURE_LEN: usize = StructuralMetrics::NAMES.len();

/// Score record for one transaction or window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyScore {
    /// Transaction id or window id
    pub subject_id: String,
    pub topology_score: f64,
    pub structure_score: f64,
    pub combined_score: f64,
    pub is_fraudulent: bool,
    pub reason: String,
    /// Baseline was too short to allow flagging
    pub cold_start: bool,
    pub features: FeatureVector,
}

impl AnomalyScore {
    fn empty(subject_id: String) -> Self {
        Self {
            subject_id,
            topology_score: 0.0,
            structure_score: 0.0,
            combined_score: 0.0,
            is_fraudulent: false,
            reason: "empty window".to_string(),
            cold_start: false,
            features: FeatureVector::zero(),
        }
    }

    pub fn is_empty_window(&self) -> bool {
        self.features.structure.node_count == 0
    }
}

/// Largest single-feature deviation behind a score.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Deviation {
    index: usize,
    z: f64,
    value: f64,
    mean: f64,
}

/// Scores feature vectors against a cross-window baseline.
#[derive(Debug)]
pub struct AnomalyScorer {
    config: ScoringConfig,
    baseline: Box<dyn Baseline>,
    drift: DriftMonitor,
}

impl AnomalyScorer {
    pub fn new(config: ScoringConfig) -> Self {
        let baseline = baseline::from_kind(&config.baseline, config.baseline_window);
        Self::with_baseline(config, baseline)
    }

    /// Use a caller-supplied estimator instead of the configured one.
    pub fn with_baseline(config: ScoringConfig, baseline: Box<dyn Baseline>) -> Self {
        Self {
            drift: DriftMonitor::new(config.drift.clone()),
            config,
            baseline,
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn baseline_len(&self) -> usize {
        self.baseline.len()
    }

    /// Whether enough history exists to flag anything.
    pub fn is_warm(&self) -> bool {
        self.baseline.len() >= self.config.min_baseline_windows
    }

    pub fn drift_monitor(&self) -> &DriftMonitor {
        &self.drift
    }

    /// Score a feature vector. Reads the baseline, never updates it.
    pub fn score(&self, subject_id: impl Into<String>, features: &FeatureVector) -> AnomalyScore {
        let subject_id = subject_id.into();
        if features.structure.node_count == 0 {
            return AnomalyScore::empty(subject_id);
        }

        let cold_start = !self.is_warm();
        let cold_reason = || {
            format!(
                "insufficient baseline: {} of {} windows observed",
                self.baseline.len(),
                self.config.min_baseline_windows
            )
        };

        let Some(stats) = self.baseline.stats() else {
            return AnomalyScore {
                subject_id,
                topology_score: 0.0,
                structure_score: 0.0,
                combined_score: 0.0,
                is_fraudulent: false,
                reason: cold_reason(),
                cold_start: true,
                features: features.clone(),
            };
        };

        let sample = feature_row(features);
        let z = self.z_scores(sample.view(), &stats);
        let (topology_z, structure_z) = z.view().split_at(Axis(0), TOPOLOGY_LEN);
        let topology_score = self.squash(topology_z);
        let structure_score = self.squash(structure_z);

        let (wt, ws) = (self.config.topology_weight, self.config.structure_weight);
        let combined_score = ((wt * topology_score + ws * structure_score) / (wt + ws)).clamp(0.0, 1.0);
        let is_fraudulent = !cold_start && combined_score >= self.config.alert_threshold;

        let dominant = dominant_deviation(&z, &sample, &stats);
        let reason = if cold_start {
            cold_reason()
        } else if is_fraudulent {
            describe(dominant, features)
        } else {
            match dominant {
                Some(d) => format!("within baseline (largest deviation: {}, z = {:.2})", feature_label(d.index), d.z),
                None => "within baseline".to_string(),
            }
        };

        AnomalyScore {
            subject_id,
            topology_score,
            structure_score,
            combined_score,
            is_fraudulent,
            reason,
            cold_start,
            features: features.clone(),
        }
    }

    /// Fold a scored window into the baseline and drift monitor.
    ///
    /// Flagged and empty windows are skipped. Drift is tracked only once
    /// the baseline is warm. Returns whether the baseline was updated,
    /// plus any drift event.
    pub fn observe_window(&mut self, score: &AnomalyScore) -> (bool, Option<DriftEvent>) {
        if score.is_fraudulent || score.is_empty_window() {
            return (false, None);
        }
        let drift = if score.cold_start {
            None
        } else {
            self.drift.observe(score.combined_score)
        };
        self.baseline.update(feature_row(&score.features).view());
        (true, drift)
    }

    fn z_scores(&self, sample: ArrayView1<'_, f64>, stats: &BaselineStats) -> Array1<f64> {
        let floor = self.config.sigma_floor;
        let sigma = stats.std.mapv(|s| s.max(floor));
        (&sample - &stats.mean).mapv(f64::abs) / sigma
    }

    fn squash(&self, z: ArrayView1<'_, f64>) -> f64 {
        if z.is_empty() {
            return 0.0;
        }
        let rms = (z.mapv(|v| v * v).sum() / z.len() as f64).sqrt();
        (rms / self.config.z_scale).tanh()
    }
}

/// Topology then structure, the layout the baseline stores.
pub fn feature_row(features: &FeatureVector) -> Array1<f64> {
    let topology = features.topology_array();
    let structure = features.structure_array();
    topology.iter().chain(structure.iter()).copied().collect()
}

fn dominant_deviation(z: &Array1<f64>, sample: &Array1<f64>, stats: &BaselineStats) -> Option<Deviation> {
    z.iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(index, &z)| Deviation {
            index,
            z,
            value: sample[index],
            mean: stats.mean[index],
        })
}

fn feature_label(index: usize) -> String {
    if index < TOPOLOGY_LEN {
        let (d, name) = FeatureVector::topology_feature(index);
        format!("H{d} {name}")
    } else {
        StructuralMetrics::NAMES
            .get(index - TOPOLOGY_LEN)
            .map_or_else(|| format!("feature {index}"), |n| (*n).to_string())
    }
}

fn describe(dominant: Option<Deviation>, features: &FeatureVector) -> String {
    let Some(d) = dominant else {
        return "combined score above threshold".to_string();
    };
    let accounts = features.structure.node_count;
    let direction = if d.value >= d.mean { "elevated" } else { "depressed" };

    if d.index >= TOPOLOGY_LEN {
        return format!(
            "{direction} {}: {:.3} against baseline {:.3} among {accounts} accounts",
            feature_label(d.index),
            d.value,
            d.mean
        );
    }

    let (dim, name) = FeatureVector::topology_feature(d.index);
    if name == "persistence_entropy" {
        return format!(
            "{direction} H{dim} persistence entropy: {:.3} against baseline {:.3}",
            d.value, d.mean
        );
    }
    let count = features.dimensions[dim].num_features;
    let what = match dim {
        0 => "connected clusters",
        1 => "cyclic structures",
        _ => "enclosed voids",
    };
    format!("{direction} H{dim} persistence: {count} {what} detected among {accounts} accounts")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::DimensionFeatures;
    use crate::scoring::baseline::RollingBaseline;

    fn vector(nodes: usize, cycles: usize, h1_total: f64) -> FeatureVector {
        let mut fv = FeatureVector::zero();
        fv.structure.node_count = nodes;
        fv.structure.edge_count = nodes;
        fv.dimensions[1] = DimensionFeatures {
            dimension: 1,
            total_persistence: h1_total,
            num_features: cycles,
            max_persistence: h1_total,
            complexity_score: 0.1 * cycles as f64 + h1_total,
            persistence_entropy: 0.0,
        };
        fv
    }

    fn warm_scorer() -> AnomalyScorer {
        let mut scorer = AnomalyScorer::new(ScoringConfig::default());
        for i in 0..10 {
            let s = scorer.score(format!("w{i}"), &vector(20 + i % 2, i % 2, 0.1 * (i % 3) as f64));
            scorer.observe_window(&s);
        }
        scorer
    }

    #[test]
    fn test_empty_vector_scores_zero() {
        let scorer = warm_scorer();
        let s = scorer.score("w", &FeatureVector::zero());
        assert_eq!(s.combined_score, 0.0);
        assert!(!s.is_fraudulent);
        assert_eq!(s.reason, "empty window");
    }

    #[test]
    fn test_cold_start_never_flags() {
        let mut scorer = AnomalyScorer::new(ScoringConfig {
            alert_threshold: 0.0,
            ..ScoringConfig::default()
        });
        for i in 0..4 {
            let s = scorer.score(format!("w{i}"), &vector(10 + 5 * i, 3 * i, i as f64));
            assert!(!s.is_fraudulent);
            assert!(s.cold_start);
            assert!(s.reason.starts_with("insufficient baseline"));
            scorer.observe_window(&s);
        }
        assert_eq!(scorer.baseline_len(), 4);
    }

    #[test]
    fn test_ring_burst_is_flagged_with_h1_reason() {
        let scorer = warm_scorer();
        let s = scorer.score("burst", &vector(60, 40, 30.0));

        assert!(s.is_fraudulent, "{s:?}");
        assert!(s.reason.contains("H1"), "{}", s.reason);
        assert!(s.reason.contains("40 cyclic structures"), "{}", s.reason);
        assert!((0.0..=1.0).contains(&s.combined_score));
    }

    #[test]
    fn test_typical_window_not_flagged() {
        let scorer = warm_scorer();
        let s = scorer.score("typical", &vector(20, 0, 0.1));
        assert!(!s.is_fraudulent);
        assert!(s.reason.starts_with("within baseline"));
    }

    #[test]
    fn test_flagged_window_does_not_update_baseline() {
        let mut scorer = warm_scorer();
        let before = scorer.baseline_len();
        let s = scorer.score("burst", &vector(60, 40, 30.0));
        assert!(s.is_fraudulent);

        let (updated, drift) = scorer.observe_window(&s);
        assert!(!updated);
        assert!(drift.is_none());
        assert_eq!(scorer.baseline_len(), before);
    }

    #[test]
    fn test_custom_baseline() {
        let scorer = AnomalyScorer::with_baseline(ScoringConfig::default(), Box::new(RollingBaseline::new(2)));
        assert!(!scorer.is_warm());
        assert_eq!(feature_row(&FeatureVector::zero()).len(), TOPOLOGY_LEN + STRUCTURE_LEN);
    }
}
