//! S-FedAvg: softmax-preference selection with importance-weighted aggregation.
//!
//! Each client carries a preference `Phi[i]` (initially `1/n`). A round
//! samples `num_selected` distinct clients with inclusion probability
//! proportional to `softmax(Phi)`, aggregates them with weight
//! `partition_size / inclusion_probability`, and then moves the selected
//! clients' preferences toward their running Shapley values:
//! `Phi[i] = alpha * Phi[i] + beta * SV[i]`.
//!
//! Sampling uses randomized systematic PPS, which hits the target inclusion
//! probabilities exactly. The aggregate divides the importance-weighted sum
//! by the whole population's weight (Horvitz-Thompson), which makes it an
//! unbiased estimate of the full-population FedAvg. Renormalizing by the
//! sample's own weight sum would be biased.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::warn;

use super::{SelectionContext, SelectionPolicy, SelectionState};
use crate::error::FedShapError;
use crate::math::softmax;
use crate::model::Client;

/// Inclusion probabilities for a fixed-size sample of `k` proportional to `probs`.
///
/// `pi[i] = min(1, k * probs[i])`; mass above 1 is redistributed over the
/// remaining clients until no probability exceeds 1. The result sums to `k`.
pub fn inclusion_probabilities(probs: &[f64], k: usize) -> Vec<f64> {
    let n = probs.len();
    if k == 0 {
        return vec![0.0; n];
    }
    if k >= n {
        return vec![1.0; n];
    }

    let mut pi = vec![0.0; n];
    let mut certain = vec![false; n];
    loop {
        let n_certain = certain.iter().filter(|&&c| c).count();
        let remaining = (k - n_certain) as f64;
        let mass: f64 = (0..n).filter(|&i| !certain[i]).map(|i| probs[i]).sum();

        let open: Vec<usize> = (0..n).filter(|&i| !certain[i]).collect();
        let mut capped = false;
        for i in open {
            pi[i] = if mass > 0.0 {
                remaining * probs[i] / mass
            } else {
                remaining / (n - n_certain) as f64
            };
            if pi[i] >= 1.0 {
                pi[i] = 1.0;
                certain[i] = true;
                capped = true;
            }
        }
        if !capped {
            return pi;
        }
    }
}

/// Draw a fixed-size sample without replacement with `P(i ∈ S) = pi[i]`.
///
/// Randomized systematic sampling: clients are shuffled, laid end to end on
/// a line with lengths `pi`, and the points `u, u + 1, ...` (with `u`
/// uniform in `[0, 1)`) pick the clients whose segments they land in.
pub fn systematic_sample(pi: &[f64], rng: &mut StdRng) -> Vec<usize> {
    let k = pi.iter().sum::<f64>().round() as usize;
    let mut order: Vec<usize> = (0..pi.len()).collect();
    order.shuffle(rng);

    let mut point: f64 = rng.gen();
    let mut cumulative = 0.0;
    let mut selected = Vec::with_capacity(k);
    for &i in &order {
        cumulative += pi[i];
        if selected.len() < k && point < cumulative {
            selected.push(i);
            point += 1.0;
        }
    }

    if selected.len() < k {
        // Only reachable through float drift in the cumulative sum
        warn!(
            wanted = k,
            got = selected.len(),
            "systematic sample came up short; filling by probability"
        );
        let mut rest: Vec<usize> = order.into_iter().filter(|i| !selected.contains(i)).collect();
        rest.sort_by(|&a, &b| pi[b].total_cmp(&pi[a]));
        selected.extend(rest.into_iter().take(k - selected.len()));
    }
    selected
}

/// Softmax-preference client selection.
#[derive(Clone, Debug)]
pub struct SFedAvg {
    num_selected: usize,
    alpha: f64,
    beta: f64,
    state: SelectionState,
    inclusion: Vec<f64>,
}

impl SFedAvg {
    /// Uniform initial preference `1/n` for every client.
    pub fn new(num_clients: usize, num_selected: usize, alpha: f64, beta: f64) -> Self {
        let initial = if num_clients > 0 {
            1.0 / num_clients as f64
        } else {
            0.0
        };
        Self {
            num_selected,
            alpha,
            beta,
            state: SelectionState::new(num_clients, initial),
            inclusion: Vec::new(),
        }
    }

    /// Inclusion probabilities used by the most recent selection.
    pub fn inclusion(&self) -> &[f64] {
        &self.inclusion
    }

    /// Inclusion probabilities implied by the current preferences.
    pub fn current_inclusion(&self) -> Vec<f64> {
        inclusion_probabilities(&softmax(&self.state.scores), self.num_selected)
    }
}

impl SelectionPolicy for SFedAvg {
    fn name(&self) -> &'static str {
        "sfedavg"
    }

    fn select(
        &mut self,
        _round: usize,
        ctx: &SelectionContext<'_>,
        rng: &mut StdRng,
    ) -> Result<Vec<usize>, FedShapError> {
        if ctx.clients.len() != self.state.len() {
            return Err(FedShapError::DimensionMismatch);
        }
        self.inclusion = self.current_inclusion();
        Ok(systematic_sample(&self.inclusion, rng))
    }

    fn aggregation_weights(&self, participants: &[usize], clients: &[Client]) -> Vec<f32> {
        participants
            .iter()
            .map(|&i| match self.inclusion.get(i) {
                Some(&p) if p > 0.0 => (clients[i].weight as f64 / p) as f32,
                _ => clients[i].weight,
            })
            .collect()
    }

    fn aggregation_total(&self, clients: &[Client]) -> Option<f32> {
        Some(clients.iter().map(|c| c.weight).sum())
    }

    fn requires_valuation(&self) -> bool {
        true
    }

    fn update(
        &mut self,
        _round: usize,
        participants: &[usize],
        values: Option<&[f64]>,
    ) -> Result<(), FedShapError> {
        let values = values.ok_or(FedShapError::MissingValuation("sfedavg"))?;
        if values.len() != participants.len() {
            return Err(FedShapError::DimensionMismatch);
        }
        if let Some(&bad) = participants.iter().find(|&&c| c >= self.state.len()) {
            return Err(FedShapError::UnknownClient(bad));
        }
        for (&client, &value) in participants.iter().zip(values.iter()) {
            self.state.observe(client, value);
            self.state.scores[client] =
                self.alpha * self.state.scores[client] + self.beta * self.state.values[client];
        }
        Ok(())
    }

    fn state(&self) -> Option<&SelectionState> {
        Some(&self.state)
    }
}
