//! Power-of-choice: pick the highest-loss clients from a random candidate pool.
//!
//! Biasing participation toward clients the current model fits worst speeds
//! up convergence on non-IID partitions. The candidate pool starts at the
//! full population and shrinks geometrically toward `num_selected`.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use tracing::debug;

use super::{SelectionContext, SelectionPolicy};
use crate::error::FedShapError;

/// Loss-biased selection with a decaying candidate pool.
#[derive(Clone, Debug)]
pub struct PowerOfChoice {
    num_selected: usize,
    decay_factor: f64,
    choose_from: usize,
}

impl PowerOfChoice {
    /// Pool starts at `num_clients` and decays by `decay_factor` per round.
    pub fn new(num_clients: usize, num_selected: usize, decay_factor: f64) -> Self {
        Self {
            num_selected,
            decay_factor,
            choose_from: num_clients.max(num_selected),
        }
    }

    /// Current candidate pool size.
    pub fn choose_from(&self) -> usize {
        self.choose_from
    }

    fn decay(&mut self) {
        let next = (self.decay_factor * self.choose_from as f64).floor() as usize;
        self.choose_from = next.max(self.num_selected).min(self.choose_from);
    }
}

impl SelectionPolicy for PowerOfChoice {
    fn name(&self) -> &'static str {
        "power_of_choice"
    }

    fn select(
        &mut self,
        _round: usize,
        ctx: &SelectionContext<'_>,
        rng: &mut StdRng,
    ) -> Result<Vec<usize>, FedShapError> {
        let mut candidates: Vec<usize> = (0..ctx.clients.len()).collect();
        candidates.shuffle(rng);
        candidates.truncate(self.choose_from);

        let losses: Vec<f64> = candidates
            .par_iter()
            .map(|&i| ctx.evaluator.client_loss(ctx.global, &ctx.clients[i]))
            .collect::<Result<_, _>>()?;

        // Stable sort over the shuffled pool: equal losses keep their random order
        let mut ranked: Vec<(usize, f64)> = candidates.into_iter().zip(losses).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(ranked
            .into_iter()
            .take(self.num_selected)
            .map(|(i, _)| i)
            .collect())
    }

    fn update(
        &mut self,
        round: usize,
        _participants: &[usize],
        _values: Option<&[f64]>,
    ) -> Result<(), FedShapError> {
        let before = self.choose_from;
        self.decay();
        if self.choose_from != before {
            debug!(round, from = before, to = self.choose_from, "power-of-choice pool decayed");
        }
        Ok(())
    }
}
