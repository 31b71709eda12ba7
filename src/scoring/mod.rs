//! Anomaly Scoring: Feature Vectors Against History
//!
//! - [`Baseline`]: per-feature reference statistics carried across windows
//! - [`AnomalyScorer`]: bounded topology, structure and combined scores
//! - [`DriftMonitor`]: CUSUM over the combined score of accepted windows

pub mod baseline;
mod drift;
mod scorer;

pub use baseline::{Baseline, BaselineStats, ExponentialBaseline, RollingBaseline};
pub use drift::{CusumDetector, DriftEvent, DriftMonitor, Reference};
pub use scorer::{feature_row, AnomalyScore, AnomalyScorer, STRUCTURE_LEN, TOPOLOGY_LEN};
