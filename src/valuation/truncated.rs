//! Truncated Monte Carlo (permutation) Shapley estimation.
//!
//! Each pass draws a random ordering of all players and walks it, growing a
//! coalition one player at a time. The walk stops evaluating as soon as the
//! coalition's utility is within `threshold` of the full coalition; every
//! later player is credited with a zero marginal for that pass. Aggregating
//! and scoring large coalitions dominates the cost, so truncation is where
//! the savings come from.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use super::convergence::{ConvergenceConfig, ValuationRecord};
use super::game::{CoalitionGame, CountingGame};
use super::Valuation;
use crate::error::FedShapError;

/// Estimate Shapley values from at most `permutations_per_player * n` permutations.
pub fn truncated_monte_carlo_shapley<G, R>(
    game: &G,
    permutations_per_player: usize,
    threshold: f64,
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

    let counted = CountingGame::new(game);
    let everyone: Vec<usize> = (0..n).collect();
    let full_value = counted.value(&everyone)?;
    let empty_value = counted.value(&[])?;

    let max_permutations = permutations_per_player.saturating_mul(n);
    let mut records: Vec<ValuationRecord> =
        (0..n).map(|_| ValuationRecord::new(convergence)).collect();
    let mut permutation = everyone.clone();
    let mut coalition: Vec<usize> = Vec::with_capacity(n);
    let mut permutations = 0;
    let mut converged = false;

    while permutations < max_permutations {
        permutation.shuffle(rng);
        permutations += 1;

        coalition.clear();
        let mut previous = empty_value;
        let mut truncated = false;

        for (position, &player) in permutation.iter().enumerate() {
            let marginal = if truncated {
                0.0
            } else {
                let at = coalition.partition_point(|&j| j < player);
                coalition.insert(at, player);
                let current = if position + 1 == n {
                    full_value
                } else {
                    counted.value(&coalition)?
                };
                let marginal = current - previous;
                previous = current;
                if (full_value - current).abs() < threshold {
                    truncated = true;
                }
                marginal
            };
            records[player].push(marginal);
        }

        if records.iter().all(|r| r.is_converged()) {
            converged = true;
            break;
        }
    }

    if !converged {
        debug!(
            players = n,
            permutations, "Truncated Monte Carlo valuation hit its budget before converging"
        );
    }

    Ok(Valuation {
        values: records.iter().map(|r| r.value()).collect(),
        evaluations: counted.evaluations(),
        samples: permutations,
        converged,
    })
}
