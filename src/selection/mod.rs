//! Client selection policies.
//!
//! | Policy | Algorithms | Needs values | State |
//! |--------|-----------|--------------|-------|
//! | [`UniformRandom`] | FedAvg, FedProx | No | None |
//! | [`PowerOfChoice`] | PoC | No | Candidate pool size |
//! | [`SFedAvg`] | S-FedAvg | Yes | `N`, `SV`, `Phi` |
//! | [`Ucb`] | UCB | Yes | `N`, `SV`, `UCB` |
//!
//! Policies are driven once per round: [`SelectionPolicy::select`], then
//! after aggregation [`SelectionPolicy::update`] with that round's
//! per-participant value estimates.

pub mod power_of_choice;
pub mod random;
pub mod sfedavg;
pub mod state;
pub mod ucb;

pub use power_of_choice::PowerOfChoice;
pub use random::UniformRandom;
pub use sfedavg::{inclusion_probabilities, systematic_sample, SFedAvg};
pub use state::SelectionState;
pub use ucb::Ucb;

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::config::Algorithm;
use crate::error::FedShapError;
use crate::model::{Client, ModelState};
use crate::traits::Evaluator;

/// Lifecycle phase of a policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyPhase {
    /// Some client has not been observed yet (UCB only)
    WarmUp,
    /// Regular operation
    SteadyState,
}

/// Read-only view of the population handed to [`SelectionPolicy::select`].
#[derive(Clone, Copy)]
pub struct SelectionContext<'a> {
    /// All clients, indexed by id
    pub clients: &'a [Client],
    /// Global model at the start of the round
    pub global: &'a ModelState,
    /// Evaluator for policies that query client losses
    pub evaluator: &'a dyn Evaluator,
}

impl<'a> SelectionContext<'a> {
    /// Bundle the round's read-only inputs.
    pub fn new(clients: &'a [Client], global: &'a ModelState, evaluator: &'a dyn Evaluator) -> Self {
        Self {
            clients,
            global,
            evaluator,
        }
    }
}

/// Strategy choosing which clients participate in a round.
pub trait SelectionPolicy: Send {
    /// Short policy name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Choose the participants of `round` (distinct client indices).
    fn select(
        &mut self,
        round: usize,
        ctx: &SelectionContext<'_>,
        rng: &mut StdRng,
    ) -> Result<Vec<usize>, FedShapError>;

    /// Raw aggregation weights for the participants returned by the last `select`.
    ///
    /// Defaults to partition sizes.
    fn aggregation_weights(&self, participants: &[usize], clients: &[Client]) -> Vec<f32> {
        participants.iter().map(|&i| clients[i].weight).collect()
    }

    /// Fixed divisor for the aggregate, if the policy needs one.
    ///
    /// `None` normalizes by the participants' own weight sum (plain FedAvg).
    /// Importance-weighted policies return the population weight so that
    /// the aggregate stays unbiased.
    fn aggregation_total(&self, _clients: &[Client]) -> Option<f32> {
        None
    }

    /// Whether [`update`](Self::update) needs per-client value estimates.
    fn requires_valuation(&self) -> bool {
        false
    }

    /// Fold in the outcome of `round`. `values` is aligned with `participants`.
    fn update(
        &mut self,
        _round: usize,
        _participants: &[usize],
        _values: Option<&[f64]>,
    ) -> Result<(), FedShapError> {
        Ok(())
    }

    /// Current lifecycle phase.
    fn phase(&self) -> PolicyPhase {
        PolicyPhase::SteadyState
    }

    /// Learned per-client statistics, for policies that keep any.
    fn state(&self) -> Option<&SelectionState> {
        None
    }
}

/// Clients per round: `ceil(select_fraction * num_clients)`, at least 1.
///
/// A tiny slack absorbs float error so that e.g. `0.7 * 10` yields 7, not 8.
pub fn num_selected(select_fraction: f64, num_clients: usize) -> Result<usize, FedShapError> {
    if num_clients == 0 {
        return Err(FedShapError::InvalidConfig(
            "population must contain at least one client".into(),
        ));
    }
    if !(select_fraction > 0.0 && select_fraction <= 1.0) {
        return Err(FedShapError::InvalidConfig(format!(
            "select_fraction must be in (0, 1], got {}",
            select_fraction
        )));
    }
    let raw = (select_fraction * num_clients as f64 - 1e-9).ceil() as usize;
    Ok(raw.clamp(1, num_clients))
}

/// Construct the policy that implements `algorithm`.
pub fn build_policy(
    algorithm: &Algorithm,
    num_clients: usize,
    num_selected: usize,
) -> Box<dyn SelectionPolicy> {
    match *algorithm {
        Algorithm::FedAvg | Algorithm::FedProx { .. } => Box::new(UniformRandom::new(num_selected)),
        Algorithm::PowerOfChoice { decay_factor } => {
            Box::new(PowerOfChoice::new(num_clients, num_selected, decay_factor))
        }
        Algorithm::SFedAvg { alpha, beta } => {
            Box::new(SFedAvg::new(num_clients, num_selected, alpha, beta))
        }
        Algorithm::Ucb { beta } => Box::new(Ucb::new(num_clients, num_selected, beta)),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_num_selected_ceil() {
        assert_eq!(num_selected(0.4, 5).unwrap(), 2);
        assert_eq!(num_selected(0.7, 10).unwrap(), 7);
        assert_eq!(num_selected(0.25, 10).unwrap(), 3);
        assert_eq!(num_selected(10.0 / 700.0, 700).unwrap(), 10);
        assert_eq!(num_selected(0.001, 10).unwrap(), 1);
        assert_eq!(num_selected(1.0, 10).unwrap(), 10);
    }

    #[test]
    fn test_num_selected_rejects_bad_input() {
        assert!(num_selected(0.0, 5).is_err());
        assert!(num_selected(1.5, 5).is_err());
        assert!(num_selected(0.5, 0).is_err());
    }

    #[test]
    fn test_build_policy_matches_algorithm() {
        assert_eq!(build_policy(&Algorithm::FedAvg, 5, 2).name(), "uniform_random");
        assert_eq!(
            build_policy(&Algorithm::FedProx { mu: 0.1 }, 5, 2).name(),
            "uniform_random"
        );
        assert_eq!(
            build_policy(&Algorithm::PowerOfChoice { decay_factor: 0.9 }, 5, 2).name(),
            "power_of_choice"
        );
        let sfedavg = build_policy(&Algorithm::SFedAvg { alpha: 0.5, beta: 0.5 }, 5, 2);
        assert!(sfedavg.requires_valuation());
        let ucb = build_policy(&Algorithm::Ucb { beta: 1.0 }, 5, 2);
        assert!(ucb.requires_valuation());
        assert_eq!(ucb.phase(), PolicyPhase::WarmUp);
    }
}
