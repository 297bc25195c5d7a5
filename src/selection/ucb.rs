//! Upper-confidence-bound client selection over running Shapley values.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::debug;

use super::{PolicyPhase, SelectionContext, SelectionPolicy, SelectionState};
use crate::error::FedShapError;

/// UCB bandit over clients: `UCB[i] = SV[i] + beta * sqrt(ln t / N[i])`.
///
/// Every client is tried once (warm-up, in index order) before scores
/// drive selection.
#[derive(Clone, Debug)]
pub struct Ucb {
    num_selected: usize,
    beta: f64,
    state: SelectionState,
}

impl Ucb {
    /// Unvisited clients start with an infinite score.
    pub fn new(num_clients: usize, num_selected: usize, beta: f64) -> Self {
        Self {
            num_selected,
            beta,
            state: SelectionState::new(num_clients, f64::INFINITY),
        }
    }

    /// Exploration coefficient.
    pub fn beta(&self) -> f64 {
        self.beta
    }

    fn bonus(&self, t: f64, count: usize) -> f64 {
        if count == 0 {
            f64::INFINITY
        } else {
            self.beta * (t.ln() / count as f64).sqrt()
        }
    }

    fn warm_up(&self, rng: &mut StdRng) -> Vec<usize> {
        let mut selected = self.state.unvisited();
        selected.truncate(self.num_selected);
        if selected.len() < self.num_selected {
            let mut visited: Vec<usize> = (0..self.state.len())
                .filter(|&i| self.state.counts[i] > 0)
                .collect();
            visited.shuffle(rng);
            let missing = self.num_selected - selected.len();
            selected.extend(visited.into_iter().take(missing));
        }
        selected
    }
}

impl SelectionPolicy for Ucb {
    fn name(&self) -> &'static str {
        "ucb"
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
        if !self.state.all_visited() {
            return Ok(self.warm_up(rng));
        }

        let mut order: Vec<usize> = (0..self.state.len()).collect();
        order.shuffle(rng);
        let scores = &self.state.scores;
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
        order.truncate(self.num_selected);
        Ok(order)
    }

    fn requires_valuation(&self) -> bool {
        true
    }

    fn update(
        &mut self,
        round: usize,
        participants: &[usize],
        values: Option<&[f64]>,
    ) -> Result<(), FedShapError> {
        let values = values.ok_or(FedShapError::MissingValuation("ucb"))?;
        if values.len() != participants.len() {
            return Err(FedShapError::DimensionMismatch);
        }
        if let Some(&bad) = participants.iter().find(|&&c| c >= self.state.len()) {
            return Err(FedShapError::UnknownClient(bad));
        }
        let was_warming = !self.state.all_visited();
        for (&client, &value) in participants.iter().zip(values.iter()) {
            self.state.observe(client, value);
        }

        let t = (round + 1) as f64;
        for i in 0..self.state.len() {
            self.state.scores[i] = self.state.values[i] + self.bonus(t, self.state.counts[i]);
        }

        if was_warming && self.state.all_visited() {
            debug!(round, "ucb warm-up complete");
        }
        Ok(())
    }

    fn phase(&self) -> PolicyPhase {
        if self.state.all_visited() {
            PolicyPhase::SteadyState
        } else {
            PolicyPhase::WarmUp
        }
    }

    fn state(&self) -> Option<&SelectionState> {
        Some(&self.state)
    }
}
