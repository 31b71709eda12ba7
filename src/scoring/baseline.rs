//! Cross-window reference statistics.
//!
//! The baseline is the only state carried from one window to the next.
//! Each sample is a full feature row (topology then structure); the
//! scorer reads back a per-feature mean and standard deviation.

use crate::config::BaselineKind;
use ndarray::{stack, Array1, ArrayView1, Axis};
use std::collections::VecDeque;
use std::fmt::Debug;

/// Per-feature reference mean and standard deviation.
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineStats {
    pub mean: Array1<f64>,
    pub std: Array1<f64>,
}

/// Estimator of per-feature reference statistics.
pub trait Baseline: Debug + Send {
    /// Current statistics; `None` until at least two samples were seen.
    fn stats(&self) -> Option<BaselineStats>;

    /// Fold in one feature row.
    fn update(&mut self, sample: ArrayView1<'_, f64>);

    /// Number of samples contributing to the statistics.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build the configured estimator.
pub fn from_kind(kind: &BaselineKind, window: usize) -> Box<dyn Baseline> {
    match *kind {
        BaselineKind::Rolling => Box::new(RollingBaseline::new(window)),
        BaselineKind::Exponential { alpha } => Box::new(ExponentialBaseline::new(alpha)),
    }
}

/// Sample mean and std over the most recent `capacity` rows.
#[derive(Debug, Clone)]
pub struct RollingBaseline {
    capacity: usize,
    samples: VecDeque<Array1<f64>>,
}

impl RollingBaseline {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            samples: VecDeque::with_capacity(capacity),
        }
    }
}

impl Baseline for RollingBaseline {
    fn stats(&self) -> Option<BaselineStats> {
        if self.samples.len() < 2 {
            return None;
        }
        let views: Vec<ArrayView1<'_, f64>> = self.samples.iter().map(|s| s.view()).collect();
        let matrix = stack(Axis(0), &views).ok()?;
        Some(BaselineStats {
            mean: matrix.mean_axis(Axis(0))?,
            std: matrix.std_axis(Axis(0), 1.0),
        })
    }

    fn update(&mut self, sample: ArrayView1<'_, f64>) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample.to_owned());
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// Exponentially weighted moving mean and variance.
///
/// μ ← μ + α·δ,  σ² ← (1 - α)·(σ² + α·δ²),  δ = x - μ
#[derive(Debug, Clone)]
pub struct ExponentialBaseline {
    alpha: f64,
    mean: Option<Array1<f64>>,
    variance: Array1<f64>,
    count: usize,
}

impl ExponentialBaseline {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            mean: None,
            variance: Array1::zeros(0),
            count: 0,
        }
    }
}

impl Baseline for ExponentialBaseline {
    fn stats(&self) -> Option<BaselineStats> {
        if self.count < 2 {
            return None;
        }
        Some(BaselineStats {
            mean: self.mean.clone()?,
            std: self.variance.mapv(f64::sqrt),
        })
    }

    fn update(&mut self, sample: ArrayView1<'_, f64>) {
        self.count += 1;
        let Some(mean) = self.mean.as_mut() else {
            self.mean = Some(sample.to_owned());
            self.variance = Array1::zeros(sample.len());
            return;
        };
        let delta = &sample - &*mean;
        mean.scaled_add(self.alpha, &delta);
        self.variance = (&self.variance + &delta.mapv(|d| self.alpha * d * d)) * (1.0 - self.alpha);
    }

    fn len(&self) -> usize {
        self.count
    }
}
