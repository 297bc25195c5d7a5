//! Stopping rule for the sampling-based Shapley estimators.
//!
//! The tester watches the sequence of running means produced by an
//! estimator. It keeps only a ring buffer of the most recent absolute
//! changes plus the lowest and highest mean ever seen, and declares
//! convergence when the recent movement is small relative to that spread.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::math::RunningMean;

/// Tunable constants of the convergence test.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceConfig {
    /// Number of most recent deltas inspected
    pub window: usize,
    /// Samples required before convergence can be declared
    pub min_samples: usize,
    /// Allowed recent movement as a fraction of the overall spread
    pub tolerance: f64,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            window: 5,
            min_samples: 10,
            tolerance: 0.05,
        }
    }
}

/// Moving-window stability check over a running-mean history.
#[derive(Clone, Debug)]
pub struct ConvergenceTester {
    config: ConvergenceConfig,
    recent: VecDeque<f64>,
    lowest: f64,
    highest: f64,
    last: Option<f64>,
    samples: usize,
}

impl ConvergenceTester {
    /// Create a tester with an empty history.
    pub fn new(config: ConvergenceConfig) -> Self {
        let window = config.window.max(1);
        Self {
            config: ConvergenceConfig { window, ..config },
            recent: VecDeque::with_capacity(window),
            lowest: f64::INFINITY,
            highest: f64::NEG_INFINITY,
            last: None,
            samples: 0,
        }
    }

    /// Record the estimator's running mean after one more sample.
    pub fn observe(&mut self, running_mean: f64) {
        if let Some(previous) = self.last {
            if self.recent.len() == self.config.window {
                self.recent.pop_front();
            }
            self.recent.push_back((running_mean - previous).abs());
        }
        self.lowest = self.lowest.min(running_mean);
        self.highest = self.highest.max(running_mean);
        self.last = Some(running_mean);
        self.samples += 1;
    }

    /// Number of observed samples.
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Whether the recent window is stable relative to the overall spread.
    pub fn is_converged(&self) -> bool {
        let required = self.config.min_samples.max(self.config.window + 1);
        if self.samples < required || self.recent.len() < self.config.window {
            return false;
        }
        let movement = self.recent.iter().copied().fold(0.0, f64::max);
        movement <= self.config.tolerance * (self.highest - self.lowest)
    }
}

/// Per-client running Shapley estimate for one estimator call.
#[derive(Clone, Debug)]
pub struct ValuationRecord {
    mean: RunningMean,
    tester: ConvergenceTester,
}

impl ValuationRecord {
    /// Empty record.
    pub fn new(config: ConvergenceConfig) -> Self {
        Self {
            mean: RunningMean::new(),
            tester: ConvergenceTester::new(config),
        }
    }

    /// Fold in one marginal-contribution sample.
    pub fn push(&mut self, marginal: f64) {
        self.mean.push(marginal);
        self.tester.observe(self.mean.value());
    }

    /// Current estimate.
    pub fn value(&self) -> f64 {
        self.mean.value()
    }

    /// Samples folded in so far.
    pub fn samples(&self) -> usize {
        self.mean.count()
    }

    /// Whether the estimate has stabilized.
    pub fn is_converged(&self) -> bool {
        self.tester.is_converged()
    }
}
