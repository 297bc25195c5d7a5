//! Per-round run history for post-hoc analysis.
//!
//! Every completed round appends one [`RoundRecord`]. The history is
//! append-only and serializes to JSON.

use serde::{Deserialize, Serialize};

use crate::selection::PolicyPhase;
use crate::traits::EvalMetrics;
use crate::valuation::ShapleyMethod;

/// Global-model metrics after a round's commit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundMetrics {
    /// Training split
    pub train: EvalMetrics,
    /// Validation split
    pub validation: EvalMetrics,
    /// Test split
    pub test: EvalMetrics,
}

impl RoundMetrics {
    fn accumulate(&mut self, other: &RoundMetrics, scale: f64) {
        for (acc, m) in [
            (&mut self.train, &other.train),
            (&mut self.validation, &other.validation),
            (&mut self.test, &other.test),
        ] {
            acc.loss += scale * m.loss;
            acc.accuracy += scale * m.accuracy;
        }
    }
}

/// Cost and accuracy of one estimator on one round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValuationDiagnostics {
    /// Estimator
    pub method: ShapleyMethod,
    /// Utility evaluations spent
    pub evaluations: usize,
    /// Cosine distance to the exact values; `None` for the exact method or zero vectors
    pub cosine_distance_to_exact: Option<f64>,
}

/// Everything observed in one round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    /// Round number (0-indexed)
    pub round: usize,
    /// Participants of the round, in selection order
    pub participants: Vec<usize>,
    /// Participation indicator over the whole population
    pub selected: Vec<bool>,
    /// Per-client value estimate for this round (0 for non-participants)
    pub values: Vec<f64>,
    /// Whether a valuation ran this round
    pub valued: bool,
    /// Utility evaluations spent by the valuation
    pub evaluations: usize,
    /// Whether the valuation converged within budget
    pub converged: bool,
    /// Policy phase when the round was selected
    pub phase: PolicyPhase,
    /// Global-model metrics after the commit
    pub metrics: RoundMetrics,
    /// Estimator comparison, when enabled
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<ValuationDiagnostics>,
}

/// Append-only list of round records.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunHistory {
    entries: Vec<RoundRecord>,
}

impl RunHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a record.
    pub fn push(&mut self, record: RoundRecord) {
        self.entries.push(record);
    }

    /// All records, in round order.
    pub fn entries(&self) -> &[RoundRecord] {
        &self.entries
    }

    /// Number of recorded rounds.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize the history to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a history produced by [`to_json`](Self::to_json).
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// How often each of `num_clients` clients participated.
    pub fn selection_counts(&self, num_clients: usize) -> Vec<usize> {
        let mut counts = vec![0; num_clients];
        for record in &self.entries {
            for (count, &hit) in counts.iter_mut().zip(record.selected.iter()) {
                if hit {
                    *count += 1;
                }
            }
        }
        counts
    }

    /// Sum of each client's per-round value estimates.
    pub fn cumulative_values(&self, num_clients: usize) -> Vec<f64> {
        let mut totals = vec![0.0; num_clients];
        for record in &self.entries {
            for (total, &v) in totals.iter_mut().zip(record.values.iter()) {
                *total += v;
            }
        }
        totals
    }

    /// Metric curve of the run, one entry per round.
    pub fn metrics(&self) -> Vec<RoundMetrics> {
        self.entries.iter().map(|r| r.metrics).collect()
    }
}

/// Elementwise mean of metric curves, truncated to the shortest curve.
pub fn average_metrics(curves: &[Vec<RoundMetrics>]) -> Vec<RoundMetrics> {
    let len = match curves.iter().map(Vec::len).min() {
        Some(len) => len,
        None => return Vec::new(),
    };
    let scale = 1.0 / curves.len() as f64;
    (0..len)
        .map(|round| {
            let mut mean = RoundMetrics::default();
            for curve in curves {
                mean.accumulate(&curve[round], scale);
            }
            mean
        })
        .collect()
}
