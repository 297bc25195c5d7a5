//! Shapley-value estimation of client contributions.
//!
//! | Method | Cost per call | Exact |
//! |--------|---------------|-------|
//! | [`exact_shapley`] | `2^n` utilities | Yes |
//! | [`monte_carlo_shapley`] | `<= 2 * n * sample_budget` | No |
//! | [`truncated_monte_carlo_shapley`] | `<= n * permutations`, often far fewer | No |
//!
//! All three take a [`CoalitionGame`]; within a round that is an
//! [`AggregateGame`] scoring hypothetical aggregates on validation data.

pub mod convergence;
pub mod exact;
pub mod game;
pub mod monte_carlo;
pub mod truncated;

pub use convergence::{ConvergenceConfig, ConvergenceTester, ValuationRecord};
pub use exact::{exact_shapley, MAX_EXACT_PLAYERS};
pub use game::{AggregateGame, CoalitionGame, CountingGame};
pub use monte_carlo::monte_carlo_shapley;
pub use truncated::truncated_monte_carlo_shapley;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::FedShapError;

/// Shapley estimation algorithm.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapleyMethod {
    /// Powerset enumeration
    Exact,
    /// Independent per-client subset sampling
    MonteCarlo,
    /// Permutation sampling with truncation
    TruncatedMonteCarlo,
}

impl ShapleyMethod {
    /// All methods, cheapest-to-verify first.
    pub const ALL: [ShapleyMethod; 3] = [
        ShapleyMethod::Exact,
        ShapleyMethod::MonteCarlo,
        ShapleyMethod::TruncatedMonteCarlo,
    ];

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            ShapleyMethod::Exact => "exact",
            ShapleyMethod::MonteCarlo => "monte_carlo",
            ShapleyMethod::TruncatedMonteCarlo => "truncated_monte_carlo",
        }
    }
}

/// Valuation settings, fixed for a run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValuationConfig {
    /// Estimator used for policy feedback
    pub method: ShapleyMethod,
    /// Monte Carlo: maximum samples per client (`T_max`)
    pub sample_budget: usize,
    /// Truncated Monte Carlo: permutation budget is this times the player count
    pub permutations_per_player: usize,
    /// Truncated Monte Carlo: distance to the full-coalition utility below which a walk stops
    pub truncation_threshold: f64,
    /// Stopping rule for the sampling estimators
    pub convergence: ConvergenceConfig,
    /// Value every round even when the policy does not consume values
    pub every_round: bool,
    /// Also run every estimator and record evaluation counts and distance to exact
    pub compare_estimators: bool,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            method: ShapleyMethod::TruncatedMonteCarlo,
            sample_budget: 50,
            permutations_per_player: 50,
            truncation_threshold: 1e-5,
            convergence: ConvergenceConfig::default(),
            every_round: false,
            compare_estimators: false,
        }
    }
}

impl ValuationConfig {
    /// Reject budgets that would make the sampling estimators return nothing.
    pub fn validate(&self) -> Result<(), FedShapError> {
        if self.sample_budget == 0 {
            return Err(FedShapError::InvalidConfig(
                "valuation.sample_budget must be at least 1".into(),
            ));
        }
        if self.permutations_per_player == 0 {
            return Err(FedShapError::InvalidConfig(
                "valuation.permutations_per_player must be at least 1".into(),
            ));
        }
        if self.truncation_threshold.is_nan() || self.truncation_threshold < 0.0 {
            return Err(FedShapError::InvalidConfig(format!(
                "valuation.truncation_threshold must be non-negative, got {}",
                self.truncation_threshold
            )));
        }
        if self.convergence.tolerance.is_nan() || self.convergence.tolerance < 0.0 {
            return Err(FedShapError::InvalidConfig(format!(
                "valuation.convergence.tolerance must be non-negative, got {}",
                self.convergence.tolerance
            )));
        }
        Ok(())
    }
}

/// Output of one estimator call.
///
/// `converged == false` means the budget ran out first; the values are still
/// the best available estimate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Valuation {
    /// Estimated Shapley value per player
    pub values: Vec<f64>,
    /// Utility evaluations performed
    pub evaluations: usize,
    /// Samples (Monte Carlo) or permutations (truncated) drawn; `2^n` for exact
    pub samples: usize,
    /// Whether every player's estimate passed the convergence test
    pub converged: bool,
}

impl Valuation {
    /// Valuation of a game with no players.
    pub fn empty() -> Self {
        Self {
            values: Vec::new(),
            evaluations: 0,
            samples: 0,
            converged: true,
        }
    }
}

/// Dispatches to the configured estimator.
#[derive(Clone, Copy, Debug, Default)]
pub struct ShapleyEstimator {
    config: ValuationConfig,
}

impl ShapleyEstimator {
    /// Create an estimator from valuation settings.
    pub fn new(config: ValuationConfig) -> Self {
        Self { config }
    }

    /// Settings in use.
    pub fn config(&self) -> &ValuationConfig {
        &self.config
    }

    /// Estimate with the configured method.
    pub fn estimate<G, R>(&self, game: &G, rng: &mut R) -> Result<Valuation, FedShapError>
    where
        G: CoalitionGame + ?Sized,
        R: Rng + ?Sized,
    {
        self.estimate_with(self.config.method, game, rng)
    }

    /// Estimate with an explicit method, keeping the other settings.
    pub fn estimate_with<G, R>(
        &self,
        method: ShapleyMethod,
        game: &G,
        rng: &mut R,
    ) -> Result<Valuation, FedShapError>
    where
        G: CoalitionGame + ?Sized,
        R: Rng + ?Sized,
    {
        match method {
            ShapleyMethod::Exact => exact_shapley(game),
            ShapleyMethod::MonteCarlo => monte_carlo_shapley(
                game,
                self.config.sample_budget,
                self.config.convergence,
                rng,
            ),
            ShapleyMethod::TruncatedMonteCarlo => truncated_monte_carlo_shapley(
                game,
                self.config.permutations_per_player,
                self.config.truncation_threshold,
                self.config.convergence,
                rng,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct Additive(Vec<f64>);

    impl CoalitionGame for Additive {
        fn players(&self) -> usize {
            self.0.len()
        }

        fn value(&self, members: &[usize]) -> Result<f64, FedShapError> {
            Ok(members.iter().map(|&m| self.0[m]).sum())
        }
    }

    #[test]
    fn test_all_methods_agree_on_additive_game() {
        // Marginals are constant, so every estimator is exact
        let game = Additive(vec![1.0, 2.0, 3.0, 4.0]);
        let estimator = ShapleyEstimator::new(ValuationConfig::default());
        let mut rng = StdRng::seed_from_u64(7);

        for method in ShapleyMethod::ALL {
            let v = estimator.estimate_with(method, &game, &mut rng).unwrap();
            for (i, expected) in [1.0, 2.0, 3.0, 4.0].iter().enumerate() {
                assert!(
                    (v.values[i] - expected).abs() < 1e-9,
                    "{} player {}: {}",
                    method.name(),
                    i,
                    v.values[i]
                );
            }
        }
    }

    #[test]
    fn test_validate_rejects_zero_budget() {
        let config = ValuationConfig {
            sample_budget: 0,
            ..ValuationConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(ValuationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_serde_defaults() {
        let config: ValuationConfig = serde_json::from_str(r#"{"method": "exact"}"#).unwrap();
        assert_eq!(config.method, ShapleyMethod::Exact);
        assert_eq!(config.sample_budget, 50);
        assert_eq!(config.convergence.window, 5);
    }
}
