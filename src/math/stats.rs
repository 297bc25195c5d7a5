//! Softmax and running means.

use serde::{Deserialize, Serialize};

/// Numerically stable softmax. Empty input yields an empty vector.
pub fn softmax(x: &[f64]) -> Vec<f64> {
    let max = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        // All -inf (or empty): fall back to uniform
        let n = x.len().max(1) as f64;
        return vec![1.0 / n; x.len()];
    }
    let exps: Vec<f64> = x.iter().map(|v| (v - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Scalar running mean updated with weight `1/count`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningMean {
    mean: f64,
    count: usize,
}

impl RunningMean {
    /// Empty running mean (value 0.0, count 0).
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in one observation and return the change in the mean.
    pub fn push(&mut self, x: f64) -> f64 {
        self.count += 1;
        let delta = (x - self.mean) / self.count as f64;
        self.mean += delta;
        delta
    }

    /// Current mean.
    pub fn value(&self) -> f64 {
        self.mean
    }

    /// Number of observations folded in.
    pub fn count(&self) -> usize {
        self.count
    }
}
