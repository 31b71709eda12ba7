//! Engine configuration.
//!
//! Every field has a default; a JSON file only needs to name the fields
//! it overrides:
//!
//! ```json
//! { "graph": { "window_seconds": 3600 }, "scoring": { "alert_threshold": 0.8 } }
//! ```

use crate::error::{EngineError, Result};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Highest homology dimension the engine reports (H0, H1, H2).
pub const MAX_SUPPORTED_DIMENSION: usize = 2;

/// Upper bound for `window_seconds` and `clock_skew_seconds` (100 years),
/// far inside chrono's representable range.
pub const MAX_DURATION_SECONDS: i64 = 100 * 366 * 24 * 3600;

/// Sliding-window graph settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Window length in seconds.
    pub window_seconds: i64,
    /// Allowed backwards jitter of transaction timestamps, in seconds.
    pub clock_skew_seconds: i64,
    /// Maximum number of retained edges; oldest are evicted first.
    pub max_edges: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            window_seconds: 24 * 3600,
            clock_skew_seconds: 300,
            max_edges: 50_000,
        }
    }
}

impl GraphConfig {
    /// Window length; saturates at `TimeDelta::MAX` for unvalidated values.
    pub fn window(&self) -> TimeDelta {
        TimeDelta::try_seconds(self.window_seconds).unwrap_or(TimeDelta::MAX)
    }

    pub fn clock_skew(&self) -> TimeDelta {
        TimeDelta::try_seconds(self.clock_skew_seconds).unwrap_or(TimeDelta::MAX)
    }
}

/// Filtration construction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiltrationConfig {
    /// Highest homology dimension reported; also the highest simplex
    /// dimension built.
    pub max_homology_dimension: usize,
    /// Largest filtration value admitted into the complex.
    pub scale_cutoff: f64,
}

impl Default for FiltrationConfig {
    fn default() -> Self {
        Self {
            max_homology_dimension: 2,
            // Pair distances live in (0, 1], so 1.0 admits every edge.
            scale_cutoff: 1.0,
        }
    }
}

/// Diagram-to-vector reduction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Minimum persistence for a pair to count as a feature.
    pub noise_threshold: f64,
    /// Weight of the surviving-feature count in `complexity_score`.
    pub count_weight: f64,
    /// Weight of count × mean persistence in `complexity_score`.
    pub magnitude_weight: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            noise_threshold: 1e-3,
            count_weight: 0.1,
            magnitude_weight: 1.0,
        }
    }
}

/// Baseline estimator selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum BaselineKind {
    /// Sample mean/std over the last `baseline_window` windows.
    #[default]
    Rolling,
    /// Exponentially weighted mean/variance with smoothing `alpha`.
    Exponential {
        #[serde(default = "default_alpha")]
        alpha: f64,
    },
}

fn default_alpha() -> f64 {
    0.01
}

/// CUSUM drift monitor settings (all in units of the reference std).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    pub enabled: bool,
    /// Allowance k.
    pub allowance: f64,
    /// Detection threshold h.
    pub threshold: f64,
    /// Number of windows used for calibration.
    pub calibration_windows: usize,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowance: 0.5,
            threshold: 5.0,
            calibration_windows: 10,
        }
    }
}

/// Scoring and baseline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// `combined_score` at or above this flags the subject.
    pub alert_threshold: f64,
    /// Number of prior windows kept by the rolling baseline.
    pub baseline_window: usize,
    /// Baseline samples required before flagging is allowed.
    pub min_baseline_windows: usize,
    pub topology_weight: f64,
    pub structure_weight: f64,
    /// RMS z-distance mapped to tanh(1) ≈ 0.76.
    pub z_scale: f64,
    /// Lower bound on baseline std, avoids division blow-ups on flat history.
    pub sigma_floor: f64,
    pub baseline: BaselineKind,
    pub drift: DriftConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            alert_threshold: 0.7,
            baseline_window: 50,
            min_baseline_windows: 5,
            topology_weight: 0.6,
            structure_weight: 0.4,
            z_scale: 3.0,
            sigma_floor: 1e-6,
            baseline: BaselineKind::Rolling,
            drift: DriftConfig::default(),
        }
    }
}

/// Full engine configuration, consumed at construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub graph: GraphConfig,
    pub filtration: FiltrationConfig,
    pub features: FeatureConfig,
    pub scoring: ScoringConfig,
}

impl EngineConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(raw)
            .map_err(|e| EngineError::Config(format!("malformed config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    /// Check value ranges and cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        let g = &self.graph;
        if g.window_seconds <= 0 {
            return Err(EngineError::Config("graph.window_seconds must be positive".into()));
        }
        if g.clock_skew_seconds < 0 {
            return Err(EngineError::Config("graph.clock_skew_seconds must be non-negative".into()));
        }
        for (field, value) in [("window_seconds", g.window_seconds), ("clock_skew_seconds", g.clock_skew_seconds)] {
            if value > MAX_DURATION_SECONDS || TimeDelta::try_seconds(value).is_none() {
                return Err(EngineError::Config(format!(
                    "graph.{field} {value} exceeds {MAX_DURATION_SECONDS}"
                )));
            }
        }
        if g.max_edges == 0 {
            return Err(EngineError::Config("graph.max_edges must be positive".into()));
        }

        let f = &self.filtration;
        if f.max_homology_dimension > MAX_SUPPORTED_DIMENSION {
            return Err(EngineError::Config(format!(
                "filtration.max_homology_dimension {} exceeds {}",
                f.max_homology_dimension, MAX_SUPPORTED_DIMENSION
            )));
        }
        if !(f.scale_cutoff.is_finite() && f.scale_cutoff > 0.0) {
            return Err(EngineError::Config("filtration.scale_cutoff must be positive and finite".into()));
        }

        let x = &self.features;
        if !(x.noise_threshold >= 0.0) {
            return Err(EngineError::Config("features.noise_threshold must be non-negative".into()));
        }
        if !(x.count_weight >= 0.0 && x.magnitude_weight >= 0.0) {
            return Err(EngineError::Config("features weights must be non-negative".into()));
        }

        let s = &self.scoring;
        if !(0.0..=1.0).contains(&s.alert_threshold) {
            return Err(EngineError::Config("scoring.alert_threshold must lie in [0, 1]".into()));
        }
        if !(s.topology_weight >= 0.0 && s.structure_weight >= 0.0) {
            return Err(EngineError::Config("scoring weights must be non-negative".into()));
        }
        if s.topology_weight + s.structure_weight <= 0.0 {
            return Err(EngineError::Config("scoring weights must not both be zero".into()));
        }
        if s.min_baseline_windows < 2 {
            return Err(EngineError::Config("scoring.min_baseline_windows must be at least 2".into()));
        }
        if s.baseline_window < s.min_baseline_windows {
            return Err(EngineError::Config(
                "scoring.baseline_window must be >= scoring.min_baseline_windows".into(),
            ));
        }
        if !(s.z_scale > 0.0 && s.sigma_floor > 0.0) {
            return Err(EngineError::Config("scoring.z_scale and sigma_floor must be positive".into()));
        }
        if let BaselineKind::Exponential { alpha } = s.baseline {
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(EngineError::Config("exponential baseline alpha must lie in (0, 1]".into()));
            }
        }
        if s.drift.enabled && s.drift.calibration_windows < 2 {
            return Err(EngineError::Config("scoring.drift.calibration_windows must be at least 2".into()));
        }
        Ok(())
    }
}
