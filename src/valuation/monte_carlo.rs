//! Simple Monte Carlo Shapley estimation.
//!
//! Each player is estimated independently: draw a coalition size uniformly
//! from `0..=n-1`, draw that many of the other players, and record the
//! utility gained by adding the player. Players run in parallel, each with
//! its own generator seeded from the caller's, so results do not depend on
//! thread scheduling.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::debug;

use super::convergence::{ConvergenceConfig, ValuationRecord};
use super::game::{CoalitionGame, CountingGame};
use super::Valuation;
use crate::error::FedShapError;

/// Estimate Shapley values with at most `sample_budget` samples per player.
pub fn monte_carlo_shapley<G, R>(
    game: &G,
    sample_budget: usize,
    convergence: ConvergenceConfig,
    rng: &mut R,
) -> Result<Valuation, FedShapError>
where
    G: CoalitionGame + ?Sized,
    R: Rng + ?Sized,
{
    let n = game.players();
    if n == 0 {
        return Ok(Valuation::empty());
    }

    let seeds: Vec<u64> = (0..n).map(|_| rng.gen()).collect();
    let counted = CountingGame::new(game);

    let records: Vec<ValuationRecord> = seeds
        .into_par_iter()
        .enumerate()
        .map(|(player, seed)| -> Result<ValuationRecord, FedShapError> {
            let mut rng = StdRng::seed_from_u64(seed);
            let others: Vec<usize> = (0..n).filter(|&j| j != player).collect();
            let mut record = ValuationRecord::new(convergence);

            for _ in 0..sample_budget {
                let size = rng.gen_range(0..n);
                let mut coalition: Vec<usize> =
                    others.choose_multiple(&mut rng, size).copied().collect();
                coalition.sort_unstable();
                let without = counted.value(&coalition)?;

                let at = coalition.partition_point(|&j| j < player);
                coalition.insert(at, player);
                let with = counted.value(&coalition)?;

                record.push(with - without);
                if record.is_converged() {
                    break;
                }
            }
            Ok(record)
        })
        .collect::<Result<_, _>>()?;

    let converged = records.iter().all(|r| r.is_converged());
    let samples = records.iter().map(|r| r.samples()).sum();
    if !converged {
        debug!(
            players = n,
            sample_budget, "Monte Carlo valuation hit its budget before converging"
        );
    }

    Ok(Valuation {
        values: records.iter().map(|r| r.value()).collect(),
        evaluations: counted.evaluations(),
        samples,
        converged,
    })
}
