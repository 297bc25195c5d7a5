//! Uniform random client selection (FedAvg / FedProx baseline).

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::{SelectionContext, SelectionPolicy};
use crate::error::FedShapError;

/// Shuffle all clients and take the first `num_selected`. Stateless.
#[derive(Clone, Debug)]
pub struct UniformRandom {
    num_selected: usize,
}

impl UniformRandom {
    /// Select `num_selected` clients per round.
    pub fn new(num_selected: usize) -> Self {
        Self { num_selected }
    }
}

impl SelectionPolicy for UniformRandom {
    fn name(&self) -> &'static str {
        "uniform_random"
    }

    fn select(
        &mut self,
        _round: usize,
        ctx: &SelectionContext<'_>,
        rng: &mut StdRng,
    ) -> Result<Vec<usize>, FedShapError> {
        let mut order: Vec<usize> = (0..ctx.clients.len()).collect();
        order.shuffle(rng);
        order.truncate(self.num_selected);
        Ok(order)
    }
}
