//! CUSUM Drift Monitor: Sequential Change-Point Detection
//!
//! Page's one-sided CUSUM over the stream of per-window combined scores:
//!
//! C(t) = max(0, C(t-1) + zₜ - k),  zₜ = (xₜ - μ₀) / σ₀
//!
//! A crossing C(t) > h signals that the score level has shifted upward
//! relative to the calibration regime. The change point is estimated as
//! the last time C was zero before the crossing.
//!
//! ## Reference
//!
//! Page, E. S. (1954). "Continuous Inspection Schemes", Biometrika 41.

use crate::config::DriftConfig;
use serde::Serialize;

/// Reference std never drops below this, so a flat calibration period
/// does not turn every later fluctuation into a detection.
const MIN_REFERENCE_STD: f64 = 1e-3;

/// Detection event with timing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftEvent {
    /// Observation index (0-based, counting calibration) of the crossing
    pub window_index: usize,
    /// CUSUM value at detection
    pub cusum_value: f64,
    /// Estimated change-point (retrospective)
    pub estimated_change_point: usize,
    /// Observed statistic at detection
    pub statistic_value: f64,
}

/// Calibrated reference regime
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reference {
    pub mean: f64,
    pub std: f64,
}

impl Reference {
    /// Sample mean and std; `None` for an empty sample.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0).max(1.0);
        Some(Self {
            mean,
            std: variance.sqrt().max(MIN_REFERENCE_STD),
        })
    }
}

/// One-sided CUSUM detector over a calibrated reference
#[derive(Debug, Clone)]
pub struct CusumDetector {
    reference: Reference,
    /// Allowance k (in reference std units)
    allowance: f64,
    /// Detection threshold h (in reference std units)
    threshold: f64,
    current: f64,
    /// Observations seen since calibration
    steps: usize,
    /// Step of the last zero of C
    last_reset: usize,
}

impl CusumDetector {
    pub fn new(reference: Reference, allowance: f64, threshold: f64) -> Self {
        Self {
            reference,
            allowance,
            threshold,
            current: 0.0,
            steps: 0,
            last_reset: 0,
        }
    }

    /// Feed one observation; returns the CUSUM value and, on a crossing,
    /// the estimated change point.
    ///
    /// After a crossing the accumulator restarts at zero, so a sustained
    /// shift reports again only after it re-accumulates past `h`.
    pub fn update(&mut self, statistic: f64) -> (f64, Option<usize>) {
        let t = self.steps;
        self.steps += 1;

        let z = (statistic - self.reference.mean) / self.reference.std;
        self.current = (self.current + z - self.allowance).max(0.0);

        if self.current == 0.0 {
            self.last_reset = t;
            return (0.0, None);
        }

        if self.current > self.threshold {
            let value = self.current;
            let change_point = self.last_reset;
            self.current = 0.0;
            self.last_reset = t;
            return (value, Some(change_point));
        }

        (self.current, None)
    }

    pub fn current_value(&self) -> f64 {
        self.current
    }

    pub fn reference(&self) -> Reference {
        self.reference
    }
}

/// CUSUM with an automatic calibration window
#[derive(Debug, Clone)]
pub struct DriftMonitor {
    config: DriftConfig,
    buffer: Vec<f64>,
    detector: Option<CusumDetector>,
    observed: usize,
    events: Vec<DriftEvent>,
}

impl DriftMonitor {
    pub fn new(config: DriftConfig) -> Self {
        Self {
            buffer: Vec::with_capacity(config.calibration_windows),
            config,
            detector: None,
            observed: 0,
            events: Vec::new(),
        }
    }

    /// Feed one statistic. Returns an event when the threshold is crossed;
    /// never returns one while calibrating or when disabled.
    pub fn observe(&mut self, statistic: f64) -> Option<DriftEvent> {
        if !self.config.enabled {
            return None;
        }
        let index = self.observed;
        self.observed += 1;

        if self.detector.is_none() {
            self.buffer.push(statistic);
            if self.buffer.len() >= self.config.calibration_windows {
                self.detector = Reference::from_samples(&self.buffer).map(|reference| {
                    CusumDetector::new(reference, self.config.allowance, self.config.threshold)
                });
                self.buffer.clear();
            }
            return None;
        }
        let detector = self.detector.as_mut()?;

        let offset = index - detector.steps;
        let (cusum_value, crossed) = detector.update(statistic);
        let event = DriftEvent {
            window_index: index,
            cusum_value,
            estimated_change_point: offset + crossed?,
            statistic_value: statistic,
        };
        self.events.push(event.clone());
        Some(event)
    }

    pub fn is_calibrated(&self) -> bool {
        self.detector.is_some()
    }

    pub fn current_value(&self) -> f64 {
        self.detector.as_ref().map_or(0.0, CusumDetector::current_value)
    }

    pub fn events(&self) -> &[DriftEvent] {
        &self.events
    }
}
