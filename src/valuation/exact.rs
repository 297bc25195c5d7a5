//! Exact Shapley values by powerset enumeration.
//!
//! Every coalition is visited as a bitmask in `0..2^n`; utilities are
//! evaluated in parallel, then folded into
//!
//! `phi_i = (1/n) * [ sum_{S ∋ i} v(S) / C(n-1, |S|-1) - sum_{S ∌ i} v(S) / C(n-1, |S|) ]`
//!
//! This is the reference the sampling estimators are validated against.

use rayon::prelude::*;

use super::game::CoalitionGame;
use super::Valuation;
use crate::error::FedShapError;
use crate::math::{binomial, mask_members};

/// Largest player count accepted by [`exact_shapley`] (`2^20` utilities).
pub const MAX_EXACT_PLAYERS: usize = 20;

/// Compute exact Shapley values of `game`.
///
/// Returns [`FedShapError::TooManyPlayers`] above [`MAX_EXACT_PLAYERS`].
pub fn exact_shapley<G: CoalitionGame + ?Sized>(game: &G) -> Result<Valuation, FedShapError> {
    let n = game.players();
    if n == 0 {
        return Ok(Valuation::empty());
    }
    if n > MAX_EXACT_PLAYERS {
        return Err(FedShapError::TooManyPlayers {
            max: MAX_EXACT_PLAYERS,
            actual: n,
        });
    }

    let n_coalitions = 1usize << n;
    let utilities: Vec<f64> = (0..n_coalitions)
        .into_par_iter()
        .map(|mask| game.value(&mask_members(mask, n)))
        .collect::<Result<_, _>>()?;

    // coefficient[s] = C(n-1, s)
    let coefficient: Vec<f64> = (0..n).map(|s| binomial(n - 1, s)).collect();

    let mut values = vec![0.0; n];
    for (mask, &v) in utilities.iter().enumerate() {
        let size = mask.count_ones() as usize;
        for (i, value) in values.iter_mut().enumerate() {
            if mask & (1 << i) != 0 {
                *value += v / coefficient[size - 1];
            } else {
                *value -= v / coefficient[size];
            }
        }
    }
    for value in values.iter_mut() {
        *value /= n as f64;
    }

    Ok(Valuation {
        values,
        evaluations: n_coalitions,
        samples: n_coalitions,
        converged: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Glove game: player 0 holds a left glove, players 1 and 2 right gloves.
    struct Gloves;

    impl CoalitionGame for Gloves {
        fn players(&self) -> usize {
            3
        }

        fn value(&self, members: &[usize]) -> Result<f64, FedShapError> {
            let left = members.contains(&0);
            let right = members.iter().any(|&m| m == 1 || m == 2);
            Ok(if left && right { 1.0 } else { 0.0 })
        }
    }

    #[test]
    fn test_glove_game_known_values() {
        let v = exact_shapley(&Gloves).unwrap();
        assert!((v.values[0] - 2.0 / 3.0).abs() < 1e-12);
        assert!((v.values[1] - 1.0 / 6.0).abs() < 1e-12);
        assert!((v.values[2] - 1.0 / 6.0).abs() < 1e-12);
        assert_eq!(v.evaluations, 8);
        assert!(v.converged);
    }

    struct Players(usize);

    impl CoalitionGame for Players {
        fn players(&self) -> usize {
            self.0
        }

        fn value(&self, members: &[usize]) -> Result<f64, FedShapError> {
            Ok(members.len() as f64)
        }
    }

    #[test]
    fn test_too_many_players() {
        assert!(matches!(
            exact_shapley(&Players(MAX_EXACT_PLAYERS + 1)),
            Err(FedShapError::TooManyPlayers { .. })
        ));
    }

    #[test]
    fn test_single_player_gets_everything() {
        let v = exact_shapley(&Players(1)).unwrap();
        assert!((v.values[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_players() {
        let v = exact_shapley(&Players(0)).unwrap();
        assert!(v.values.is_empty());
    }
}
