//! Per-client statistics shared by the value-driven selection policies.

use serde::{Deserialize, Serialize};

/// Visit counts, running values, and policy scores, one entry per client.
///
/// `counts[i]` only ever grows and equals the number of rounds client `i`
/// has participated in. `values[i]` is the running mean of the client's
/// per-round value estimates, each folded in with weight `1 / counts[i]`.
/// `scores` holds the policy-specific quantity (UCB score or softmax
/// preference).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectionState {
    /// Rounds each client has been selected (`N[i]`)
    pub counts: Vec<usize>,
    /// Running mean value estimate (`SV[i]`)
    pub values: Vec<f64>,
    /// Policy score (`UCB[i]` or `Phi[i]`)
    pub scores: Vec<f64>,
}

impl SelectionState {
    /// Fresh state with zero counts and values and every score set to `initial_score`.
    pub fn new(num_clients: usize, initial_score: f64) -> Self {
        Self {
            counts: vec![0; num_clients],
            values: vec![0.0; num_clients],
            scores: vec![initial_score; num_clients],
        }
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether no clients are tracked.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Count one more participation of `client` and fold `value` into its mean.
    pub fn observe(&mut self, client: usize, value: f64) {
        self.counts[client] += 1;
        let n = self.counts[client] as f64;
        self.values[client] += (value - self.values[client]) / n;
    }

    /// Whether every client has been observed at least once.
    pub fn all_visited(&self) -> bool {
        self.counts.iter().all(|&c| c > 0)
    }

    /// Clients never observed so far, ascending.
    pub fn unvisited(&self) -> Vec<usize> {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, &c)| c == 0)
            .map(|(i, _)| i)
            .collect()
    }
}
